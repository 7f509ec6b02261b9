use std::env;

/// Command-line configuration for the demo binary: which bar-table CSV
/// to load, which strategy to run it through, and where to drop the
/// result artifacts from spec.md §6. Generalizes the teacher's `-d`
/// single-flag `Config` into the small set of flags this crate's demo
/// actually needs.
#[derive(Debug)]
pub struct Config {
    pub data_path: String,
    pub strategy: String,
    pub output_dir: String,
    pub optimize: bool,
}

impl Config {
    pub fn new() -> Config {
        let mut data_path: Option<String> = None;
        let mut strategy = "sma_crossover".to_string();
        let mut output_dir = "./out".to_string();
        let mut optimize = false;

        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match &arg[..] {
                "-h" | "--help" => Self::help(),
                "-o" | "--optimize" => optimize = true,
                "-d" | "--data" => {
                    if let Some(path) = args.next() {
                        data_path = Some(path);
                    } else {
                        panic!("no value specified for -d/--data")
                    }
                }
                "-s" | "--strategy" => {
                    if let Some(name) = args.next() {
                        strategy = name;
                    } else {
                        panic!("no value specified for -s/--strategy")
                    }
                }
                "--out" => {
                    if let Some(path) = args.next() {
                        output_dir = path;
                    } else {
                        panic!("no value specified for --out")
                    }
                }
                _ => {
                    if arg.starts_with('-') {
                        println!("unknown argument {}", arg);
                    } else {
                        println!("unknown positional argument {}", arg);
                    }
                }
            }
        }

        if let Some(data_path) = data_path {
            Config { data_path, strategy, output_dir, optimize }
        } else {
            panic!("no input CSV was provided. Use the -d/--data argument.");
        }
    }

    pub fn help() {
        println!("backtester demo");
        println!();
        println!("  -d, --data <path>      bar-table CSV to load (required)");
        println!("  -s, --strategy <name>  strategy to run (default: sma_crossover)");
        println!("  -o, --optimize         run a parameter search instead of a single backtest");
        println!("      --out <dir>        directory to write result artifacts to (default: ./out)");
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_path: String::new(),
            strategy: "sma_crossover".to_string(),
            output_dir: "./out".to_string(),
            optimize: false,
        }
    }
}
