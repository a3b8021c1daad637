//! The `examkit init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("examkit.toml").exists() {
        println!("examkit.toml already exists, skipping.");
    } else {
        std::fs::write("examkit.toml", SAMPLE_CONFIG)?;
        println!("Created examkit.toml");
    }

    std::fs::create_dir_all("sessions")?;
    let example_path = std::path::Path::new("sessions/example.toml");
    if example_path.exists() {
        println!("sessions/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_SESSION)?;
        println!("Created sessions/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point server_url in examkit.toml at your exam backend");
    println!("  2. Run: examkit validate --session sessions/example.toml");
    println!("  3. Run: examkit take --session sessions/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examkit configuration

# ${VAR} references are expanded from the environment
server_url = "http://localhost:5000/api"
fetch_timeout_secs = 30
submit_timeout_secs = 30
output_dir = "./examkit-results"
"#;

const EXAMPLE_SESSION: &str = r#"[session]
stream_id = "engineering"
subject_ids = ["physics", "mathematics"]
topic_ids = ["kinematics", "calculus"]
# easy, medium, hard or mixed
difficulty = "mixed"
# 1.5 minutes per question, rounded up to a whole minute
question_count = 10
"#;
