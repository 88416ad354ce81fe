use log::{debug, info};
use mirage::config::InterpreterConfig;
use mirage::engine_headless::headless_services;
use mirage::interpreter::Interpreter;
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    // Display help information if no script file provided
    if args.len() < 2 {
        println!("mirage - headless script VM runner for adventure-game bytecode");
        println!();
        println!("Usage: {} <script.bin> [--config mirage.toml]", args[0]);
        println!();
        println!("Runs the script blob against the recording engine backends and");
        println!("prints the engine event log when every thread has finished.");
        println!("Set RUST_LOG=debug for a per-instruction dispatch trace.");
        return Ok(());
    }

    let script_path = &args[1];

    let mut config = InterpreterConfig::default();
    if args.len() >= 4 && args[2] == "--config" {
        config = InterpreterConfig::load(Path::new(&args[3]))?;
        debug!("config loaded from {}: {:?}", args[3], config);
    }

    // Load the script blob with user-friendly error handling
    let mut file = match File::open(script_path) {
        Ok(file) => file,
        Err(e) => {
            match e.kind() {
                std::io::ErrorKind::NotFound => {
                    eprintln!("Error: Script file not found: {}", script_path);
                    eprintln!();
                    eprintln!("Please check:");
                    eprintln!("• File path is correct");
                    eprintln!("• You're running from the right directory");
                }
                _ => {
                    eprintln!("Error: Cannot open script file '{}': {}", script_path, e);
                }
            }
            std::process::exit(1);
        }
    };
    let mut code = Vec::new();
    if let Err(e) = file.read_to_end(&mut code) {
        eprintln!("Error: Cannot read script file '{}': {}", script_path, e);
        std::process::exit(1);
    }

    let entry_code_id = config.entry_code_id;
    let auto_menu_choice = config.auto_menu_choice;
    let (services, handles) = headless_services(auto_menu_choice);
    let mut interp = Interpreter::with_config(services, config);
    interp.programs.insert(entry_code_id, code);
    interp.start_script_thread(entry_code_id, 0, [0, 0, 0])?;

    info!(
        "running {} ({} bytes) as code id {:08X}",
        script_path,
        interp.programs.code(entry_code_id)?.len(),
        entry_code_id
    );

    let result = interp.run_until_idle();
    match &result {
        Ok(rounds) => debug!("finished after {} scheduler rounds", rounds),
        Err(e) => eprintln!("\nError during execution: {e}"),
    }

    // Dump whatever the engine saw, even on failure
    for line in handles.log.borrow().iter() {
        println!("{}", line);
    }
    if interp.threads.live_count() > 0 {
        info!("{} thread(s) still parked at exit", interp.threads.live_count());
    }

    result
        .map(|_| ())
        .map_err(|e| Box::new(std::io::Error::other(e)) as Box<dyn std::error::Error>)
}
