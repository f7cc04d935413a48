// Session cookie storage
// The session token lives in a site-scoped cookie. Reads go through the
// parsed `Cookie` header form, writes through `Set-Cookie` strings.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// A cookie write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieWrite {
    pub name: String,
    pub value: String,
    pub path: String,
    /// `Some(0)` expires the cookie immediately
    pub max_age: Option<i64>,
}

impl CookieWrite {
    /// A write that removes the cookie right away
    pub fn expire(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            value: String::new(),
            path: path.to_string(),
            max_age: Some(0),
        }
    }

    pub fn is_expiry(&self) -> bool {
        matches!(self.max_age, Some(age) if age <= 0)
    }

    /// `Set-Cookie` header value
    pub fn to_header_value(&self) -> String {
        let mut header = format!("{}={}", self.name, self.value);
        if let Some(max_age) = self.max_age {
            header.push_str(&format!("; Max-Age={}", max_age));
        }
        header.push_str(&format!("; Path={}", self.path));
        header
    }
}

/// Trait for client-side cookie storage
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// Current value of a cookie, `None` if unset
    async fn get(&self, name: &str) -> Option<String>;

    /// Apply a cookie write. Must be visible to the next `get`.
    async fn set(&self, write: CookieWrite);
}

/// Extract a cookie value from a `Cookie` header (`a=1; b=2`).
/// Empty values count as absent.
pub fn parse_cookie(header: &str, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(prefix.as_str()))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// In-memory cookie jar
pub struct MemoryCookieStore {
    cookies: RwLock<HashMap<String, String>>,
    writes: RwLock<Vec<CookieWrite>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self {
            cookies: RwLock::new(HashMap::new()),
            writes: RwLock::new(Vec::new()),
        }
    }

    /// Seed the jar from a `Cookie` header
    pub fn from_header(header: &str) -> Self {
        let cookies = header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, value)| !name.is_empty() && !value.is_empty())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Self {
            cookies: RwLock::new(cookies),
            writes: RwLock::new(Vec::new()),
        }
    }

    /// Render the jar as a `Cookie` header
    pub async fn header(&self) -> String {
        let cookies = self.cookies.read().await;
        let mut pairs: Vec<String> = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }

    /// Every write applied so far, oldest first
    pub async fn writes(&self) -> Vec<CookieWrite> {
        self.writes.read().await.clone()
    }
}

impl Default for MemoryCookieStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CookieStore for MemoryCookieStore {
    async fn get(&self, name: &str) -> Option<String> {
        let header = self.header().await;
        parse_cookie(&header, name)
    }

    async fn set(&self, write: CookieWrite) {
        debug!("Set-Cookie: {}", write.to_header_value());

        {
            let mut cookies = self.cookies.write().await;
            if write.is_expiry() || write.value.is_empty() {
                cookies.remove(&write.name);
            } else {
                cookies.insert(write.name.clone(), write.value.clone());
            }
        }

        self.writes.write().await.push(write);
    }
}
