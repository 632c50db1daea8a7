use crate::cli::{Cli, Commands};
use crate::services::output::print_out;
use crate::services::registry::Registry;

pub fn handle_checks_command(cli: &Cli) -> anyhow::Result<bool> {
    let Commands::Checks = &cli.command else {
        return Ok(false);
    };

    let listing = Registry::standard()?.listing();
    print_out(cli.json, &listing, |c| {
        format!(
            "{}\t{}{}\t{}",
            c.check_id,
            c.applicability,
            if c.exclusive { " exclusive" } else { "" },
            c.requirement_ids.join(",")
        )
    })?;
    Ok(true)
}
