use clap::Parser;

fn main() {
    let cli = service_template::cli::Cli::parse();
    if let Err(e) = service_template::cmd::dispatch(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
