use std::process::ExitCode;

use clap::Args;

use toolbelt::ctx::Options;
use toolbelt::session::Session;
use toolbelt::toolbox::Toolbox;

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Only show installer output when an install fails
    #[arg(long)]
    silent: bool,
}

/// Install all configured tools.
///
/// # Errors
///
/// Returns an error if any installation fails.
pub fn run(
    args: &SetupArgs,
    toolbox: &Toolbox,
    session: &mut dyn Session,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut options = Options::new();
    if args.silent {
        options.insert("silent".to_string(), true.into());
    }
    toolbox.setup(session, &options)?;
    Ok(ExitCode::SUCCESS)
}
