use colored::*;

pub fn print_connected(relay_url: &str, identify_token: &str) {
    println!("{} Connected to {}", "✓".green(), relay_url.bright_white());
    println!("{} Identifying as {}", "→".blue(), identify_token.yellow());
}

pub fn print_acknowledgment(ack: &str) {
    println!("{} Relay says {}", "✓".green(), ack.dimmed());
}

pub fn print_prompt(prompt: &str) {
    println!("\n[{}] {}", "agent".bright_blue().bold(), prompt);
}

pub fn print_reply(reply: &str) {
    println!("[{}] {}", "model".bright_magenta().bold(), reply);
}

pub fn print_inference_failure(error: &anyhow::Error) {
    println!(
        "{} Inference failed, message skipped: {}",
        "✗".red(),
        error.to_string().dimmed()
    );
}

pub fn print_closed() {
    println!("\n{}", "Relay closed the connection".bright_white().bold());
}
