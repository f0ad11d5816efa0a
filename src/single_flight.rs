//! Single-flight parse coordination.
//!
//! Each `(content_hash, parser_version)` key goes through
//! `empty → in_flight → ready`: the first requester runs the parse, everyone
//! else awaits the same cell and receives the same immutable result.

use crate::errors::Result;
use script_parser::Ast;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// A parsed tree as shared between requesters.
#[derive(Debug)]
pub struct CachedParse {
    pub ast: Arc<Ast>,
    pub diag_count: u32,
    /// True when the tree was rehydrated from the persistent cache rather
    /// than parsed in this process.
    pub from_cache: bool,
}

type FlightKey = (String, u32);
type FlightCell = Arc<OnceCell<Arc<CachedParse>>>;

#[derive(Default)]
pub struct ParseFlights {
    inner: Mutex<HashMap<FlightKey, FlightCell>>,
}

impl ParseFlights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join (or start) the flight for `key`. `init` runs at most once per
    /// key; all callers receive the shared result.
    pub async fn get_or_parse<F, Fut>(&self, key: FlightKey, init: F) -> Result<Arc<CachedParse>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<CachedParse>>>,
    {
        let cell = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key).or_default().clone()
        };
        let value = cell.get_or_try_init(init).await?;
        Ok(value.clone())
    }
}
