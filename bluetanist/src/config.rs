use bluetanist_types::protocol::NODE_IDENTITY_ID;
use embassy_time::Duration;

use crate::server::Role;

/// Tunable configuration of a mesh node.
pub struct MeshConfig<'a> {
    /// Role the node starts in, can be switched later through the set-role attribute
    pub initial_role: Role,
    /// Byte pattern a node advertisement must end with to be captured.
    ///
    /// Defaults to the node id alone, so both the complete and the incomplete 128-bit
    /// service list match.
    pub identity_marker: &'a [u8],
    pub scan_params: ScanParams,
    pub connect_params: ConnectParams,
    pub connect_retry: ConnectRetryConfig,
    pub read_retry: ReadRetryConfig,
    pub request_retry: RequestRetryConfig,
    pub refresh: RefreshConfig,
    /// Start a new scan once a node disconnects and the connect queue is drained
    pub rescan_on_disconnect: bool,
}

impl Default for MeshConfig<'_> {
    fn default() -> Self {
        Self {
            initial_role: Role::Node,
            identity_marker: &NODE_IDENTITY_ID,
            scan_params: ScanParams::default(),
            connect_params: ConnectParams::default(),
            connect_retry: ConnectRetryConfig::default(),
            read_retry: ReadRetryConfig::default(),
            request_retry: RequestRetryConfig::default(),
            refresh: RefreshConfig::default(),
            rescan_on_disconnect: true,
        }
    }
}

/// Scan parameters handed to the link layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    pub active: bool,
    pub interval: Duration,
    pub window: Duration,
    pub filter_duplicates: bool,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            active: true,
            interval: Duration::from_millis(100),
            window: Duration::from_millis(50),
            filter_duplicates: false,
        }
    }
}

/// Connection parameters requested when connecting to a node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectParams {
    pub min_connection_interval: Duration,
    pub max_connection_interval: Duration,
    pub max_latency: u16,
    pub supervision_timeout: Duration,
}

impl Default for ConnectParams {
    fn default() -> Self {
        Self {
            min_connection_interval: Duration::from_millis(50),
            max_connection_interval: Duration::from_millis(70),
            max_latency: 0,
            supervision_timeout: Duration::from_millis(420),
        }
    }
}

/// Policy of the sequential connect procedure
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectRetryConfig {
    /// Delay before a connect that failed with "radio busy" is tried again
    pub retry_delay: Duration,
    /// Give up on a node after this many busy retries, `None` retries until the radio is free
    pub max_busy_retries: Option<u32>,
    /// Drop a node whose connection doesn't complete in time
    pub connect_timeout: Duration,
}

impl Default for ConnectRetryConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(100),
            max_busy_retries: None,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Policy for attribute reads completing with an error
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadRetryConfig {
    /// Number of retries per failed read, 0 disables retrying
    pub max_attempts: u8,
    pub delay: Duration,
}

impl Default for ReadRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            delay: Duration::from_millis(200),
        }
    }
}

/// Policy for discovery and read requests the attribute client rejects.
///
/// The request is issued again on the same connection. Once the retries are used up a
/// peer that can't become ready anymore is disconnected and dropped.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestRetryConfig {
    pub max_attempts: u8,
    pub delay: Duration,
}

impl Default for RequestRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(100),
        }
    }
}

/// When cached peer values are read again
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RefreshConfig {
    /// Request new values from every peer after the aggregate has been read
    pub on_aggregate_read: bool,
    /// Periodic refresh, disabled when `None`
    pub interval: Option<Duration>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            on_aggregate_read: true,
            interval: None,
        }
    }
}
