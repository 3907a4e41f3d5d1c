//! Command Handlers

use std::collections::HashMap;
use tracing::{info, warn};

use tw_core::Address;
use tw_engine::{
    CooldownPolicy, Dashboard, DistributionTargets, EngineConfig, IncomeStrategy, SchedulerHandle,
    TwClient,
};

use crate::commands::{
    config::ConfigCommands,
    execute::{RegisterArgs, RunArgs, UpgradeArgs},
    query::{DownlineArgs, IncomeArgs, ReferralsArgs},
    Cli, Commands, OutputFormat,
};
use crate::error::{CliError, CliResult};
use crate::output;

/// Environment configuration with command-line overrides applied
pub fn build_config(cli: &Cli) -> CliResult<EngineConfig> {
    let mut config = EngineConfig::from_env();

    if let Some(url) = &cli.ledger_url {
        config.ledger.url = url.clone();
    }
    if let Some(url) = &cli.backend_url {
        config.backend.url = url.clone();
    }
    if let Some(url) = &cli.signer_url {
        config.signer.url = Some(url.clone());
    }
    if let Some(token) = &cli.signer_token {
        config.signer.token = Some(token.clone());
    }
    if let Some(cooldown) = &cli.cooldown {
        config.registration_cooldown = CooldownPolicy::parse(cooldown).ok_or_else(|| {
            CliError::invalid_arg(format!(
                "cooldown must be daily, short or a number of seconds, got {}",
                cooldown
            ))
        })?;
    }
    if let Some(strategy) = &cli.income_strategy {
        let window = match config.income_strategy {
            IncomeStrategy::ClientAggregated { window } => window,
            IncomeStrategy::ServerPaginated => tw_core::DEFAULT_INCOME_WINDOW,
        };
        config.income_strategy = IncomeStrategy::parse(strategy, window).ok_or_else(|| {
            CliError::invalid_arg(format!("income strategy must be server or client, got {}", strategy))
        })?;
    }
    if let Some(path) = &cli.cooldown_db {
        config.cooldown_db = Some(path.clone());
    }

    Ok(config)
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> CliResult<()> {
    let config = build_config(&cli)?;
    let format = cli.format;

    if let Commands::Config(cmd) = &cli.command {
        return handle_config(cmd, &config, format);
    }

    let client = TwClient::new(config)?;
    match cli.command {
        Commands::Royalty(args) => {
            let snapshot = client.royalty(&args.address).await;
            output::print_royalty(&snapshot, format);
        }
        Commands::Income(args) => handle_income(&client, args, format).await,
        Commands::Downline(args) => handle_downline(&client, args, format).await,
        Commands::Sponsors(args) => {
            let sponsors = client.sponsors(&args.address).await?;
            output::print_sponsors(&args.address, &sponsors, format);
        }
        Commands::Referrals(args) => handle_referrals(&client, args, format).await,
        Commands::Stats(args) => {
            let participant = client.participant(&args.address).await?;
            let dashboard = Dashboard::new();
            dashboard.refresh(&client, &args.address).await;
            output::print_stats(&participant, &dashboard.view(), format);
        }
        Commands::RankIncome(args) => {
            let income = client.rank_income(&args.address).await;
            output::print_rank_income(&args.address, income.as_ref(), format);
        }
        Commands::ReferralCode(args) => {
            let code = client.referral_code(&args.address).await;
            output::print_referral_code(&args.address, code.as_deref(), format);
        }
        Commands::Register(args) => handle_register(&client, args, format).await?,
        Commands::Upgrade(args) => handle_upgrade(&client, args, format).await?,
        Commands::Run(args) => handle_run(&client, args).await?,
        Commands::Config(_) => {}
    }
    Ok(())
}

async fn display_ids(client: &TwClient, wanted: bool, addresses: Vec<Address>) -> HashMap<Address, String> {
    if !wanted || addresses.is_empty() {
        return HashMap::new();
    }
    client.display_ids(&addresses).await
}

async fn handle_income(client: &TwClient, args: IncomeArgs, format: OutputFormat) {
    let page = client
        .income_page(&args.address, args.page, args.per_page, &args.filter)
        .await;
    let ids = display_ids(
        client,
        args.ids,
        page.events.iter().map(|e| e.address).collect(),
    )
    .await;
    output::print_income(&page, args.page, args.per_page, &ids, format);
}

async fn handle_downline(client: &TwClient, args: DownlineArgs, format: OutputFormat) {
    let page = client
        .downline(&args.address, args.depth, args.start, args.limit)
        .await;
    let ids = display_ids(client, args.ids, page.addresses()).await;
    output::print_downline(&page, args.depth, &ids, format);
}

async fn handle_referrals(client: &TwClient, args: ReferralsArgs, format: OutputFormat) {
    let page = client
        .referrals(&args.address, args.page, args.per_page)
        .await;
    let ids = display_ids(client, args.ids, page.addresses()).await;
    output::print_referrals(&page, args.page, args.per_page, &ids, format);
}

async fn handle_register(client: &TwClient, args: RegisterArgs, format: OutputFormat) -> CliResult<()> {
    let referrer = match (args.referrer, &args.code) {
        (Some(referrer), _) => referrer,
        (None, Some(code)) => {
            let referrer = client.referrer_for_code(code).await?;
            info!(code = %code, referrer = %referrer, "Referral code resolved");
            referrer
        }
        (None, None) => return Err(CliError::invalid_arg("either --referrer or --code is required")),
    };

    let outcome = client
        .register(&args.address, &referrer, args.code.as_deref())
        .await?;
    output::print_registration(&outcome, format);
    Ok(())
}

async fn handle_upgrade(client: &TwClient, args: UpgradeArgs, format: OutputFormat) -> CliResult<()> {
    let outcome = client.upgrade(&args.address, args.level).await?;
    output::print_upgrade(&outcome, format);
    Ok(())
}

async fn handle_run(client: &TwClient, args: RunArgs) -> CliResult<()> {
    if client.config().signer.token.is_none() {
        return Err(CliError::config(
            "TW_SIGNER_TOKEN is required to run the schedulers",
        ));
    }
    let period = args
        .interval
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| client.config().poll_interval());
    if period.is_zero() {
        return Err(CliError::invalid_arg("interval must be greater than zero"));
    }

    let mut handles: Vec<SchedulerHandle> = Vec::new();
    if !args.no_registration {
        handles.push(client.registration_scheduler(&args.address)?.start(period));
    }
    if !args.no_distribution {
        let targets = if args.tiers.is_empty() {
            DistributionTargets::Participant(args.address)
        } else {
            DistributionTargets::Tiers(args.tiers.clone())
        };
        handles.push(client.distribution_scheduler(targets).start(period));
    }

    output::print_info(&format!(
        "Schedulers running for {} every {}s, press Ctrl-C to stop",
        args.address,
        period.as_secs()
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, stopping");
    }
    for handle in handles {
        handle.stop().await;
    }
    output::print_info("Schedulers stopped");
    Ok(())
}

fn handle_config(cmd: &ConfigCommands, config: &EngineConfig, format: OutputFormat) -> CliResult<()> {
    match cmd {
        ConfigCommands::Show => match format {
            // token is skipped on serialization
            OutputFormat::Json => output::print_json(config),
            OutputFormat::Table => {
                output::print_info("Current Configuration:");
                output::print_row("Ledger URL:", &config.ledger.url);
                output::print_row("Backend URL:", &config.backend.url);
                output::print_row(
                    "Signer URL:",
                    config.signer.url.as_deref().unwrap_or("(not set)"),
                );
                output::print_row(
                    "Signer token:",
                    if config.signer.token.is_some() { "(set)" } else { "(not set)" },
                );
                output::print_row(
                    "Cooldown:",
                    &format!(
                        "{:?} ({}s)",
                        config.registration_cooldown,
                        config.registration_cooldown.duration().as_secs()
                    ),
                );
                output::print_row("Income strategy:", &format!("{:?}", config.income_strategy));
                output::print_row("Poll interval:", &format!("{}s", config.poll_interval_secs));
                output::print_row(
                    "Cooldown store:",
                    &config
                        .cooldown_db
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "(memory)".to_string()),
                );
            }
        },
        ConfigCommands::Tiers => output::print_tiers(&config.tiers, format),
    }
    Ok(())
}
