//! Optional capabilities that can be toggled on a running pool

use std::fmt;

/// Background capabilities of a [`ConnectionPool`](crate::ConnectionPool)
///
/// # Examples
///
/// ```
/// use esox_connectionpool::{ConnectionPool, ConnectionState, PoolError, PoolFeature, PooledConnection, PoolConfiguration};
/// use std::sync::Arc;
///
/// struct Conn(ConnectionState);
///
/// impl PooledConnection for Conn {
///     fn is_closed(&self) -> bool { false }
///     fn state(&self) -> &ConnectionState { &self.0 }
/// }
///
/// let pool = Arc::new(ConnectionPool::<Conn>::new(PoolConfiguration::default()).unwrap());
///
/// assert_eq!(
///     pool.enable(PoolFeature::Monitor),
///     Err(PoolError::UnsupportedCapability(PoolFeature::Monitor)),
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PoolFeature {
    /// Freeze idle connections past the staleness threshold
    Reaper,

    /// Active connection monitoring. Declared but not implemented.
    Monitor,

    /// Freeze least-recently-used idle connections when the idle set grows too large
    Reclaimer,
}

impl PoolFeature {
    pub fn is_supported(self) -> bool {
        !matches!(self, PoolFeature::Monitor)
    }

    pub(crate) fn thread_name(self) -> &'static str {
        match self {
            PoolFeature::Reaper => "connpool-reaper",
            PoolFeature::Monitor => "connpool-monitor",
            PoolFeature::Reclaimer => "connpool-reclaimer",
        }
    }
}

impl fmt::Display for PoolFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolFeature::Reaper => write!(f, "reaper"),
            PoolFeature::Monitor => write!(f, "monitor"),
            PoolFeature::Reclaimer => write!(f, "reclaimer"),
        }
    }
}
