use std::future::Future;

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// Caching - keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }

    pub fn to_string(&self) -> String {
        self.into()
    }
}

impl<T: ToString + Serialize> Into<String> for &CacheKey<T> {
    fn into(self) -> String {
        match self._type {
            CacheKeyType::Tag => format!("tag-{}", self._value.to_string()),
            CacheKeyType::Ingredient => format!("ingredient-{}", self._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum CacheKeyType {
    Tag,
    Ingredient,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for CacheLifetime {
    fn from(key: &CacheKey<T>) -> Self {
        match &key._type {
            CacheKeyType::Tag => CacheLifetime::BindTagCache,
            CacheKeyType::Ingredient => CacheLifetime::BindIngredientCache,
        }
    }
}

// Cache - wrappers

/// Entries bound to a family stay valid until that family's bind key rotates.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum CacheLifetime {
    BindTagCache,
    BindIngredientCache,
}

impl CacheLifetime {
    fn bind_key(&self) -> &'static str {
        match self {
            CacheLifetime::BindTagCache => "tag-cache-key",
            CacheLifetime::BindIngredientCache => "ingredient-cache-key",
        }
    }

    /// Current bind of the family. `None` until the family is first rotated.
    pub async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, potion::Error> {
        get_cache_value::<&str, String>(self.bind_key(), cache).await
    }

    pub async fn validate_cache_bind(
        &self,
        bind: &Option<String>,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, potion::Error> {
        Ok(bind == &self.get_cache_bind(cache).await?)
    }

    /// Invalidates every entry bound to this family.
    pub async fn rotate(&self, cache: &mut MultiplexedConnection) -> Result<(), potion::Error> {
        let key = self.bind_key();
        let bind = uuid::Uuid::new_v4().simple().to_string();
        log::trace!("> Rotating {key} to {bind}");
        set_cache_value::<&str, String>(key, bind, cache).await
    }
}

#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> RedisValue<T> {
    async fn new(
        value: T,
        lifetime: CacheLifetime,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, potion::Error> {
        let bind = lifetime.get_cache_bind(cache).await?;

        Ok(Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        })
    }

    async fn validate(&self, cache: &mut MultiplexedConnection) -> Result<bool, potion::Error> {
        self._lifetime.validate_cache_bind(&self._bind, cache).await
    }

    async fn lookup<K: ToString + Serialize>(
        key: &CacheKey<K>,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<T>, potion::Error> {
        let value = get_cache_value::<String, RedisValue<T>>(key.into(), cache)
            .await
            .unwrap_or_else(|_| {
                log::error!("> Failed to deserialize cached value {}", key.to_string());
                None
            });

        match value {
            Some(value) => {
                log::trace!("> Found {:?}", key.to_string());
                match value.validate(cache).await? {
                    true => Ok(Some(value.value)),
                    false => {
                        log::trace!("> Invalidated {}", key.to_string());
                        Ok(None)
                    }
                }
            }
            None => Ok(None),
        }
    }

    async fn store<K: ToString + Serialize>(
        key: &CacheKey<K>,
        value: T,
        cache: &mut MultiplexedConnection,
    ) -> Result<(), potion::Error> {
        let value = RedisValue::new(value, key.into(), cache).await?;
        set_cache_value::<String, RedisValue<T>>(key.into(), value, cache).await
    }
}

/// Optional redis handle. Every failure degrades to a plain database read.
#[derive(Clone, Default)]
pub struct Cache {
    connection: Option<MultiplexedConnection>,
}

impl Cache {
    pub fn disabled() -> Self {
        Self { connection: None }
    }

    pub async fn connect(url: &str) -> Result<Self, potion::Error> {
        let client = redis::Client::open(url).map_err(CacheError::from)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(CacheError::from)?;

        Ok(Self {
            connection: Some(connection),
        })
    }

    pub async fn get_or<T, K, F, Fut>(&self, key: CacheKey<K>, callback: F) -> Result<T, potion::Error>
    where
        T: Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>,
        K: ToString + Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, potion::Error>>,
    {
        let mut connection = match &self.connection {
            Some(connection) => connection.clone(),
            None => return callback().await,
        };

        match RedisValue::<T>::lookup(&key, &mut connection).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(_) => log::warn!("> Cache lookup failed for {}", key.to_string()),
        }

        log::trace!("> Fetching {:?}", key.to_string());
        let value = callback().await?;

        if RedisValue::store(&key, value.clone(), &mut connection)
            .await
            .is_err()
        {
            log::warn!("> Failed to cache {}", key.to_string());
        }

        Ok(value)
    }

    pub async fn invalidate(&self, lifetime: CacheLifetime) {
        if let Some(connection) = &self.connection {
            let mut connection = connection.clone();
            if lifetime.rotate(&mut connection).await.is_err() {
                log::warn!("> Failed to rotate {lifetime:?}");
            }
        }
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), potion::Error> {
    let _: () = cache.set(key, value).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, potion::Error> {
    let value: Option<V> = cache.get(key).await.map_err(CacheError::from)?;

    Ok(value)
}
