use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("langfilter")
        .version("1.0.0")
        .author("langfilter contributors")
        .about("Hide feed items that are not in your languages")
        .arg(clap::arg!(<INPUT> "URL to fetch, local HTML file, or '-' for stdin"))
        .arg(clap::arg!(-l --lang <CODES> "Comma-separated language codes to keep (e.g. \"en,es\")"))
        .arg(clap::arg!(--lenient "Tolerate a few foreign letters and use statistical detection"))
        .arg(clap::arg!(--disabled "Run with filtering switched off (nothing is hidden)"))
        .arg(clap::arg!(--no_videos "Leave video cards alone"))
        .arg(clap::arg!(--no_channels "Leave channel cards alone"))
        .arg(
            clap::arg!(--append <FILE> "HTML fragment appended to the feed after the first scan (repeatable)")
                .action(clap::ArgAction::Append)
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::arg!(--settings <FILE> "Settings file (JSON)")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::arg!(-o --output <FILE> "Output file (default: stdout)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::arg!(-f --format <FORMAT> "Output format (html, json, text)")
                .value_name("FORMAT")
                .default_value("html")
                .value_parser(["html", "json", "text"]),
        )
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").default_value("30"))
        .arg(clap::arg!(--user_agent <UA> "Custom User-Agent for HTTP requests").value_name("UA"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "langfilter", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "langfilter", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "langfilter", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "langfilter", &completions_dir).unwrap();

    println!("cargo:warning=Shell completions generated in: {}", completions_dir.display());
}
