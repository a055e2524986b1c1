use anyhow::Error;

use crate::repos::config::{
    get_config_path, get_gaia_api_key, get_gaia_base_url, get_gaia_default_model, get_relay_port,
};

pub fn run() -> Result<(), Error> {
    println!("config file: {}", get_config_path().display());
    println!("gaia_base_url = {}", get_gaia_base_url());
    println!("gaia_default_model = {}", get_gaia_default_model());
    println!("relay_port = {}", get_relay_port());
    match get_gaia_api_key() {
        Some(_) => println!("gaia_api_key = (set)"),
        None => println!("gaia_api_key = (not set)"),
    }
    Ok(())
}
