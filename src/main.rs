mod cli;

use clap::Parser;
use serde::Serialize;
use tracing::error;

use cli::{Cli, Command, DriverCommand, OrderCommand, RouteCommand};
use fleetops::config::{load_config, print_schema};
use fleetops::models::{NewDriver, NewOrder, NewRoute, SimulationParams};
use fleetops::utils::init_logging;
use fleetops::{ApiClient, ApiError};

type BoxError = Box<dyn std::error::Error>;

fn print_json<T: Serialize>(value: &T) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Command::Schema = cli.command {
        if let Err(e) = print_schema() {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let client = match ApiClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create API client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&client, cli.command).await {
        if let Some(api_error) = e.downcast_ref::<ApiError>() {
            if !client.is_authenticated() && api_error.status().is_some() {
                eprintln!("Session expired or missing; run `fleetops login` again.");
            }
            if let Some(detail) = api_error.detail() {
                eprintln!("{}", detail);
            }
        }
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(client: &ApiClient, command: Command) -> Result<(), BoxError> {
    match command {
        Command::Schema => print_schema()?,
        Command::Login(args) => {
            client.login(&args.username, &args.password).await?;
            println!("Logged in as {}", args.username);
        }
        Command::Register(args) => {
            client.register(&args.username, &args.password).await?;
            println!("Registered and logged in as {}", args.username);
        }
        Command::Logout => {
            client.logout();
            println!("Logged out");
        }
        Command::Status => {
            if client.is_authenticated() {
                println!("Logged in ({})", client.base_url());
            } else {
                println!("Not logged in");
            }
        }
        Command::Dashboard => match client.latest_simulation().await? {
            Some(simulation) => print_json(&simulation)?,
            None => println!("No simulations found yet. Run your first one with `fleetops simulate`."),
        },
        Command::Simulate {
            drivers,
            start,
            max_hours,
        } => {
            let params = SimulationParams {
                available_drivers: drivers,
                route_start_time: start,
                max_hours_per_driver: max_hours,
            };
            print_json(&client.run_simulation(&params).await?)?;
        }
        Command::Drivers(cmd) => match cmd {
            DriverCommand::List => print_json(&client.list_drivers().await?)?,
            DriverCommand::Add {
                name,
                shift_hours,
                past_week_hours,
            } => {
                let driver = NewDriver {
                    name,
                    shift_hours,
                    past_week_hours,
                };
                print_json(&client.create_driver(&driver).await?)?;
            }
            DriverCommand::Delete { id } => client.delete_driver(id).await?,
        },
        Command::Routes(cmd) => match cmd {
            RouteCommand::List => print_json(&client.list_routes().await?)?,
            RouteCommand::Add {
                route_id,
                distance_km,
                traffic_level,
                base_time_min,
            } => {
                let route = NewRoute {
                    route_id,
                    distance_km,
                    traffic_level,
                    base_time_min,
                };
                print_json(&client.create_route(&route).await?)?;
            }
            RouteCommand::Delete { id } => client.delete_route(id).await?,
        },
        Command::Orders(cmd) => match cmd {
            OrderCommand::List => print_json(&client.list_orders().await?)?,
            OrderCommand::Add {
                order_id,
                value_rs,
                route,
                delivery_time_min,
            } => {
                let order = NewOrder {
                    order_id,
                    value_rs,
                    route,
                    delivery_time_min,
                };
                print_json(&client.create_order(&order).await?)?;
            }
            OrderCommand::Delete { id } => client.delete_order(id).await?,
        },
    }
    Ok(())
}
