use clap::Parser;
use icstrack::analytics::visitor_key;

/// Print the visitor key a client would be recorded under
#[derive(Parser)]
#[command(name = "visitor-key")]
#[command(about = "Compute the pseudonymized visitor key for a client", long_about = None)]
struct Cli {
    /// Client IP address as seen by the edge
    #[arg(long, default_value = "")]
    ip: String,
    /// Full user-agent header
    #[arg(long = "user-agent", default_value = "")]
    user_agent: String,
}

fn main() {
    let cli = Cli::parse();
    println!("{}", visitor_key(&cli.ip, &cli.user_agent));
}
