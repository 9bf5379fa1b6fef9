use std::process::Command;

fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    let revision = git_output(&["describe", "--always", "--dirty", "--abbrev=8"])
        .unwrap_or_else(|| "dev".to_string());

    println!("cargo:rustc-env=CHATTER_CONSOLE_REVISION={revision}");
}
