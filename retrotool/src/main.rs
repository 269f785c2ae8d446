mod cmd;
mod decode;

use argh::FromArgs;

#[derive(FromArgs, PartialEq, Debug)]
/// Tools for cooking and packaging game assets.
struct TopLevel {
    #[argh(subcommand)]
    command: cmd::SubCommand,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .format_level(false)
        .init();

    let args: TopLevel = argh::from_env();
    let result = match args.command {
        cmd::SubCommand::Import(args) => cmd::import::run(args),
        cmd::SubCommand::Pack(args) => cmd::pack::run(args),
    };
    if let Err(e) = result {
        eprintln!("Failed: {e:?}");
        std::process::exit(1);
    }
}
