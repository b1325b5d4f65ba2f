use clap::Parser;
use miette::Result;
use portal::cli::commands;
use portal::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    let default_level = match (&cli.command, global.verbose) {
        (_, true) => "debug",
        (Commands::Serve(_), false) => "info",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::User(cmd) => commands::user::run(cmd, &global),
        Commands::Company(cmd) => commands::company::run(cmd, &global),
        Commands::Internship(cmd) => commands::internship::run(cmd, &global),
        Commands::App(cmd) => commands::app::run(cmd, &global),
        Commands::Review(args) => commands::review::run(args, &global),
        Commands::Supervisor(cmd) => commands::supervisor::run(cmd, &global),
        Commands::Committee(cmd) => commands::committee::run(cmd, &global),
        Commands::Doc(cmd) => commands::doc::run(cmd, &global),
        Commands::Send(args) => commands::placement::run_send(args, &global),
        Commands::CompanyResponse(args) => commands::placement::run_company_response(args, &global),
        Commands::Visit(cmd) => commands::visit::run(cmd, &global),
        Commands::Complete(args) => commands::placement::run_complete(args, &global),
        Commands::Dashboard(args) => commands::dashboard::run(args, &global),
        Commands::Report(cmd) => commands::report::run(cmd, &global),
        Commands::Serve(args) => commands::serve::run(args, &global),
        Commands::Completions(args) => commands::completions::run(args),
    }
}
