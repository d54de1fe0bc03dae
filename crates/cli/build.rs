use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("perlego")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Perlego Contributors")
        .about("Turn web pages into clean, readable articles")
        .arg(clap::arg!(<INPUT> "URL to fetch, local HTML file, or '-' for stdin"))
        .arg(
            clap::arg!(-o --output <FILE> "Output file (default: stdout)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::arg!(-f --format <FORMAT> "Output format (html, text, json)")
                .value_name("FORMAT")
                .default_value("html")
                .value_parser(["html", "text", "json"]),
        )
        .arg(clap::arg!(--url <BASE> "Base URL for resolving links when reading a file or stdin"))
        .arg(clap::arg!(--paginate "Follow next-page links and merge the pages (URL input only)"))
        .arg(clap::arg!(--max_pages <N> "Maximum number of pages merged with --paginate").default_value("30"))
        .arg(clap::arg!(--pretty "Indent the HTML output"))
        .arg(clap::arg!(--no_stylesheet "Do not embed the reading stylesheet"))
        .arg(
            clap::arg!(--style <STYLE> "Reading style")
                .default_value("newspaper")
                .value_parser(["newspaper", "novel", "ebook", "terminal", "apertura", "athelas"]),
        )
        .arg(
            clap::arg!(--margin <MARGIN> "Reading margin")
                .default_value("wide")
                .value_parser(["extra-narrow", "narrow", "medium", "wide", "extra-wide"]),
        )
        .arg(
            clap::arg!(--size <SIZE> "Font size")
                .default_value("medium")
                .value_parser(["extra-small", "small", "medium", "large", "extra-large"]),
        )
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").default_value("30"))
        .arg(clap::arg!(--user_agent <UA> "Custom User-Agent for HTTP requests").value_name("UA"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "perlego", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "perlego", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "perlego", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "perlego", &completions_dir).unwrap();

    println!("cargo:warning=Shell completions generated in: {}", completions_dir.display());
}
