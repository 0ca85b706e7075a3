#[cfg(unix)]
fn main() {
    use clap::Parser;
    use run_non_root_cli::Cli;
    use run_non_root_core::RunNonRootErr;
    use run_non_root_core::error::LOOKUP_FAILED_EXIT_CODE;
    use run_non_root_core::error::USAGE_EXIT_CODE;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Help and version go to stdout and succeed.
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            std::process::exit(USAGE_EXIT_CODE);
        }
    };
    if let Err(err) = run_non_root_cli::run_main(cli) {
        let exit_code = err
            .downcast_ref::<RunNonRootErr>()
            .map_or(LOOKUP_FAILED_EXIT_CODE, RunNonRootErr::exit_code);
        #[allow(clippy::print_stderr)]
        {
            eprintln!("run-non-root: {err}");
        }
        std::process::exit(exit_code);
    }
}

#[cfg(not(unix))]
fn main() {
    #[allow(clippy::print_stderr)]
    {
        eprintln!("run-non-root: only supported on Unix");
    }
    std::process::exit(1);
}
