use merlin_shading::cli::CliOverrides;

fn main() {
    env_logger::init();
    let options = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed.into_run_options(),
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = merlin_shading::run_with_options(options) {
        eprintln!("[shade_preview] error: {err:?}");
        std::process::exit(1);
    }
}
