use anyhow::Result;
use rand::Rng;

/// Random bytes in a fetch key (hex-encoded = 2x chars).
const KEY_RANDOM_BYTES: usize = 32;

pub fn generate_fetch_key() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..KEY_RANDOM_BYTES).map(|_| rng.gen()).collect();
    hex::encode(random_bytes)
}

pub fn run_keygen() -> Result<()> {
    let key = generate_fetch_key();
    println!("{}", key);
    println!();
    println!("Set it as \"fetch_key\" in the config file or export HOTLINES_FETCH_KEY.");
    println!("Trigger a refresh with: GET /fetch?key=<key>");
    Ok(())
}
