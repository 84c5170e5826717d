use std::sync::{Mutex, PoisonError};

use super::TokenStore;
use crate::error::StoreError;
use crate::models::TokenUpdate;

#[derive(Default)]
struct Slots {
    access: Option<String>,
    refresh: Option<String>,
}

/// Tokens kept in process memory only.
#[derive(Default)]
pub struct MemoryTokenStore {
    slots: Mutex<Slots>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut Slots) -> R) -> R {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut slots)
    }
}

impl TokenStore for MemoryTokenStore {
    fn access(&self) -> String {
        self.with_slots(|s| s.access.clone().unwrap_or_default())
    }

    fn refresh(&self) -> String {
        self.with_slots(|s| s.refresh.clone().unwrap_or_default())
    }

    fn set(&self, update: TokenUpdate) -> Result<(), StoreError> {
        self.with_slots(|s| {
            if let Some(access) = update.access {
                s.access = Some(access);
            }
            if let Some(refresh) = update.refresh {
                s.refresh = Some(refresh);
            }
        });
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.with_slots(|s| *s = Slots::default());
        Ok(())
    }
}
