use clap::Parser;
use taketake::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let debug = cli.debug;
    taketake_common::init_tracing(cli.log_level, debug);

    if let Err(err) = taketake::run(cli).await {
        let is_arg_error = err.downcast_ref::<taketake::ArgError>().is_some();
        eprintln!("{}", taketake_common::report_error(&err, debug));
        std::process::exit(if is_arg_error { 2 } else { 1 });
    }
}
