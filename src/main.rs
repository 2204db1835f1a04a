use colored::Colorize;

fn main() {
    if let Err(e) = goatfish::run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
