// dcpu16c - compiler for the DCPU-16
// Compiles source files to DCPU-16 assembly listings

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use dcpu16c::dcpu_compiler::{CompilerConfig, DcpuCompiler};
use dcpu16c::vm::{Machine, DEFAULT_STEP_LIMIT};

fn main() {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut input_file = "";
    let mut output_file: Option<String> = None;
    let mut config_file: Option<String> = None;
    let mut run = false;
    let mut max_steps = DEFAULT_STEP_LIMIT;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: -o requires a filename");
                    process::exit(1);
                }
                output_file = Some(args[i + 1].clone());
                i += 2;
            }
            "-c" | "--config" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: -c requires a filename");
                    process::exit(1);
                }
                config_file = Some(args[i + 1].clone());
                i += 2;
            }
            "--run" => {
                run = true;
                i += 1;
            }
            "--max-steps" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --max-steps requires a number");
                    process::exit(1);
                }
                max_steps = match args[i + 1].parse() {
                    Ok(steps) => steps,
                    Err(_) => {
                        eprintln!("Error: Invalid step count '{}'", args[i + 1]);
                        process::exit(1);
                    }
                };
                i += 2;
            }
            "-v" | "--verbose" => {
                verbose = true;
                i += 1;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option '{}'", arg);
                print_usage(&args[0]);
                process::exit(1);
            }
            _ => {
                if input_file.is_empty() {
                    input_file = &args[i];
                } else {
                    eprintln!("Error: Multiple input files specified");
                    process::exit(1);
                }
                i += 1;
            }
        }
    }

    if input_file.is_empty() {
        eprintln!("Error: No input file specified");
        print_usage(&args[0]);
        process::exit(1);
    }

    let config = match &config_file {
        Some(path) => match CompilerConfig::from_file(Path::new(path)) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Compilation error: {}", err);
                process::exit(1);
            }
        },
        None => CompilerConfig::default(),
    };

    if verbose {
        eprintln!(
            "Compiling {} -> {}",
            input_file,
            output_file.as_deref().unwrap_or("<stdout>")
        );
    }

    // Read source file
    let source = match fs::read_to_string(input_file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading '{}': {}", input_file, err);
            process::exit(1);
        }
    };

    // Compile
    let compiler = DcpuCompiler::new(config);
    let listing = match compiler.compile_to_listing(&source) {
        Ok(listing) => listing,
        Err(err) => {
            eprintln!("Compilation error: {}", err);
            process::exit(1);
        }
    };
    let text = format!("{}\n", listing);

    match &output_file {
        Some(path) => {
            if let Err(err) = fs::write(path, &text) {
                eprintln!("Error writing '{}': {}", path, err);
                process::exit(1);
            }
            if verbose {
                eprintln!("Wrote {} lines to {}", listing.len(), path);
            }
        }
        None if !run => print!("{}", text),
        None => {}
    }

    if run {
        let mut machine = match Machine::from_listing(&listing) {
            Ok(machine) => machine,
            Err(err) => {
                eprintln!("Machine error: {}", err);
                process::exit(1);
            }
        };
        if let Err(err) = machine.run(max_steps) {
            eprintln!("Machine error: {}", err);
            process::exit(1);
        }

        println!("halted after {} steps", machine.steps());
        println!("a = {}", machine.register_a());
        let screen = machine.display(compiler.config().memory.screen_address);
        for (offset, word) in screen.iter().enumerate() {
            if *word != 0 {
                println!("screen[{}] = {:#06x}", offset, word);
            }
        }
    }
}

fn print_usage(program_name: &str) {
    println!("Usage: {} [options] <input>", program_name);
    println!();
    println!("Options:");
    println!("  -o, --output <file>    Output filename (default: stdout)");
    println!("  -c, --config <file>    TOML configuration file");
    println!("  --run                  Execute the listing and print the result");
    println!(
        "  --max-steps <n>        Instruction limit for --run (default: {})",
        DEFAULT_STEP_LIMIT
    );
    println!("  -v, --verbose          Verbose output");
    println!("  -h, --help             Show this help message");
    println!();
    println!("Logging is controlled by RUST_LOG (e.g. RUST_LOG=debug).");
}
