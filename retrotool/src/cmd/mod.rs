pub mod import;
pub mod pack;

use argh::FromArgs;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub enum SubCommand {
    Import(import::Args),
    Pack(pack::Args),
}
