use clap::Parser;
use runtests::cli;

fn main() {
    let args = cli::Args::parse();
    match cli::dispatch(args) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            // Config errors happen before any subscriber exists, so skip tracing here.
            eprintln!("error: {:#}", err);
            std::process::exit(1);
        }
    }
}
