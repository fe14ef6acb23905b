use std::process;

use procmux::{cli, run};

fn main() {
    let args = cli::get_args();
    match run::run(args) {
        Ok(status) => process::exit(status),
        Err(err) => {
            eprintln!("procmux: {}", err);
            process::exit(1);
        }
    }
}
