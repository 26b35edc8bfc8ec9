use std::path::Path;
use std::{env, fs};

use const_gen::*;
use serde::Deserialize;

/// `[mesh]` table of the optional mesh config file
#[derive(Debug, Deserialize)]
#[serde(default)]
struct MeshConstantsConfig {
    /// Maximum number of peers the master tracks at once
    max_peers: usize,
    /// Capacity of the transport event channel
    event_channel_size: usize,
    /// Capacity of the local attribute request channel
    local_request_channel_size: usize,
    /// Maximum number of attribute requests waiting for a retry
    scheduled_request_capacity: usize,
}

impl Default for MeshConstantsConfig {
    fn default() -> Self {
        Self {
            max_peers: 8,
            event_channel_size: 16,
            local_request_channel_size: 2,
            scheduled_request_capacity: 8,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MeshTomlConfig {
    #[serde(default)]
    mesh: MeshConstantsConfig,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=BLUETANIST_TOML_PATH");

    // Read the mesh config if it's present
    let user_config_str = if let Ok(toml_path) = env::var("BLUETANIST_TOML_PATH") {
        println!("cargo:rerun-if-changed={toml_path}");
        fs::read_to_string(&toml_path).expect("Failed to read mesh config file")
    } else {
        "".to_string()
    };

    let user_toml: MeshTomlConfig = toml::from_str(&user_config_str).expect("Failed to parse BLUETANIST_TOML_PATH file\n");
    let constants = user_toml.mesh;

    if constants.max_peers == 0 {
        panic!("mesh.max_peers must be at least 1");
    }
    if constants.event_channel_size == 0 || constants.local_request_channel_size == 0 {
        panic!("mesh channel sizes must be at least 1");
    }

    let constant_strs = [
        const_declaration!(pub MAX_PEERS = constants.max_peers),
        const_declaration!(pub EVENT_CHANNEL_SIZE = constants.event_channel_size),
        const_declaration!(pub LOCAL_REQUEST_CHANNEL_SIZE = constants.local_request_channel_size),
        const_declaration!(pub SCHEDULED_REQUEST_CAPACITY = constants.scheduled_request_capacity),
    ];

    // Write to constants.rs file
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("constants.rs");
    fs::write(&dest_path, constant_strs.join("\n")).expect("Failed to write constants.rs file");
}
