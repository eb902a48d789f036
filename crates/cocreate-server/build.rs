use std::process::Command;

// Stamps BUILD_TIME for the /version endpoint. SOURCE_DATE_EPOCH pins it for
// reproducible builds.
fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let mut date = Command::new("date");
    date.arg("-u");
    if let Ok(epoch) = std::env::var("SOURCE_DATE_EPOCH") {
        date.arg("-d").arg(format!("@{}", epoch.trim()));
    }
    date.arg("+%Y-%m-%dT%H:%M:%SZ");

    let build_time = date
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=BUILD_TIME={}", build_time);
}
