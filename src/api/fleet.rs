use serde::de::DeserializeOwned;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::{Driver, Listing, NewDriver, NewOrder, NewRoute, Order, Route};

pub const DRIVERS_PATH: &str = "/api/drivers/";
pub const ROUTES_PATH: &str = "/api/routes/";
pub const ORDERS_PATH: &str = "/api/orders/";

fn item_path(collection: &str, id: u64) -> String {
    format!("{}{}/", collection, id)
}

impl ApiClient {
    async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, ApiError> {
        let listing: Listing<T> = self.get_json(collection).await?;
        Ok(listing.into_vec())
    }

    pub async fn list_drivers(&self) -> Result<Vec<Driver>, ApiError> {
        self.list(DRIVERS_PATH).await
    }

    pub async fn create_driver(&self, driver: &NewDriver) -> Result<Driver, ApiError> {
        driver.validate()?;
        self.post_json(DRIVERS_PATH, driver).await
    }

    pub async fn delete_driver(&self, id: u64) -> Result<(), ApiError> {
        self.delete(&item_path(DRIVERS_PATH, id)).await
    }

    pub async fn list_routes(&self) -> Result<Vec<Route>, ApiError> {
        self.list(ROUTES_PATH).await
    }

    pub async fn create_route(&self, route: &NewRoute) -> Result<Route, ApiError> {
        route.validate()?;
        self.post_json(ROUTES_PATH, route).await
    }

    pub async fn delete_route(&self, id: u64) -> Result<(), ApiError> {
        self.delete(&item_path(ROUTES_PATH, id)).await
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.list(ORDERS_PATH).await
    }

    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, ApiError> {
        order.validate()?;
        self.post_json(ORDERS_PATH, order).await
    }

    pub async fn delete_order(&self, id: u64) -> Result<(), ApiError> {
        self.delete(&item_path(ORDERS_PATH, id)).await
    }
}
