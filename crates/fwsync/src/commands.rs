//! Command handlers.
//!
//! Each handler builds the manager it needs, loads it, drives one action and
//! prints the result. Business rules stay in fwsync-core.

use anyhow::{Context as _, Result, anyhow, bail};
use fwsync_core::catalog::ProviderId;
use fwsync_core::engine::RuleTarget;
use fwsync_core::manager::{ExpansionReport, ReportLevel, SubmitOutcome};
use fwsync_core::model::{CloudConfig, FirewallRule, Protocol, RecordId, mask_secret};
use fwsync_core::traits::{CloudConfigStore, Confirm};
use fwsync_core::{
    Catalog, CloudConfigManager, ManagerConfig, ManagerEvent, RuleManager, SettingsManager,
};
use fwsync_store_http::HttpStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::{
    Command, ConfigArgs, ConfigsCommand, RuleTargetArgs, RulesCommand, SettingsCommand,
};

/// Shared handles for every command
pub struct Context {
    pub store: Arc<HttpStore>,
    pub confirm: Arc<dyn Confirm>,
    pub catalog: Arc<Catalog>,
    pub manager: ManagerConfig,
}

/// Run one parsed command
pub async fn run(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Rules(command) => run_rules(command, ctx).await,
        Command::Configs(command) => run_configs(command, ctx).await,
        Command::Providers => list_providers(ctx).await,
        Command::Regions { provider } => list_regions(&provider, ctx).await,
        Command::Settings(command) => run_settings(command, ctx).await,
    }
}

async fn rule_manager(ctx: &Context) -> Result<(RuleManager, mpsc::Receiver<ManagerEvent>)> {
    let (mut manager, events) = RuleManager::new(
        ctx.store.clone(),
        ctx.store.clone(),
        ctx.confirm.clone(),
        ctx.catalog.clone(),
        &ctx.manager,
    )?;
    manager.load().await.context("Failed to load rules")?;
    Ok((manager, events))
}

async fn config_manager(ctx: &Context) -> Result<(CloudConfigManager, mpsc::Receiver<ManagerEvent>)> {
    let (mut manager, events) = CloudConfigManager::new(
        ctx.store.clone(),
        ctx.confirm.clone(),
        ctx.catalog.clone(),
        &ctx.manager,
    )?;
    manager.load().await.context("Failed to load cloud configs")?;
    Ok((manager, events))
}

/// Log whatever the manager emitted while the command ran
fn log_events(events: &mut mpsc::Receiver<ManagerEvent>) {
    while let Ok(event) = events.try_recv() {
        debug!("Manager event: {:?}", event);
    }
}

async fn run_rules(command: RulesCommand, ctx: &Context) -> Result<()> {
    let (mut manager, mut events) = rule_manager(ctx).await?;

    let result = match command {
        RulesCommand::List => {
            print_rules(&manager);
            Ok(())
        }
        RulesCommand::Preview(target) => preview_rule(&mut manager, &target),
        RulesCommand::Add {
            target,
            remark,
            disabled,
        } => add_rule(&mut manager, &target, remark, !disabled).await,
        RulesCommand::Edit {
            id,
            remark,
            config,
            port,
            protocol,
            enabled,
        } => {
            let rule = find_rule(&manager, id)?;
            manager.begin_edit(&rule);
            if let Some(form) = manager.form_mut() {
                if let Some(remark) = remark {
                    form.remark = remark;
                }
                if let Some(port) = port {
                    form.port = port;
                }
                if let Some(enabled) = enabled {
                    form.enabled = enabled;
                }
            }
            if let Some(config) = config {
                manager.select_config(config)?;
            }
            if let Some(protocol) = protocol {
                manager.set_protocol(Protocol::from(protocol))?;
            }

            match manager.submit().await? {
                SubmitOutcome::Updated(rule) => println!("Updated rule {} (port {})", rule.id, rule.port),
                SubmitOutcome::Created(report) => print_expansion(&report),
            }
            Ok(())
        }
        RulesCommand::Delete { id } => {
            if manager.delete_rule(id).await? {
                println!("Deleted rule {}", id);
            } else {
                println!("Cancelled");
            }
            Ok(())
        }
        RulesCommand::Execute { id } => match manager.execute_rule(id).await? {
            Some(report) => match report.level {
                ReportLevel::Success => {
                    println!("{}", report.message);
                    Ok(())
                }
                ReportLevel::Error => Err(anyhow!("Rule {}: {}", id, report.message)),
            },
            None => {
                println!("Cancelled");
                Ok(())
            }
        },
    };

    log_events(&mut events);
    result
}

/// Open a create form and fill it from the command line
fn fill_create_form(manager: &mut RuleManager, target: &RuleTargetArgs) -> Result<()> {
    manager.begin_create();
    manager.select_config(target.config)?;
    if manager.selected_config().is_none() {
        bail!("Cloud config {} not found", target.config);
    }
    manager.set_protocol(Protocol::from(target.protocol.as_str()))?;

    if manager.port_input_enabled() {
        if let Some(form) = manager.form_mut() {
            form.port = target.port.clone();
        }
    } else if !target.port.is_empty() {
        println!(
            "Protocol {} covers every port; ignoring --port {}",
            target.protocol, target.port
        );
    }
    Ok(())
}

fn preview_rule(manager: &mut RuleManager, target: &RuleTargetArgs) -> Result<()> {
    fill_create_form(manager, target)?;

    let config = manager
        .selected_config()
        .ok_or_else(|| anyhow!("Cloud config {} not found", target.config))?;
    let form = manager
        .form()
        .ok_or_else(|| anyhow!("No rule form is open"))?;
    let plan = manager
        .normalizer()
        .plan_create(&RuleTarget::from(config), &form.protocol, &form.port);

    println!(
        "Target:      {} - {}",
        manager
            .normalizer()
            .catalog()
            .full_label(&config.provider, config.service_type),
        config.instance_id
    );
    println!(
        "Multi-port:  {}",
        if manager.supports_multi_port() { "yes" } else { "no" }
    );
    println!("Mode:        {:?}", plan.mode());
    println!("Rules:       {}", manager.port_count());
    for port in plan.ports() {
        println!("  {} {}", form.protocol, port);
    }

    manager.cancel();
    Ok(())
}

async fn add_rule(
    manager: &mut RuleManager,
    target: &RuleTargetArgs,
    remark: String,
    enabled: bool,
) -> Result<()> {
    fill_create_form(manager, target)?;
    if let Some(form) = manager.form_mut() {
        form.remark = remark;
        form.enabled = enabled;
    }

    match manager.submit().await {
        Ok(SubmitOutcome::Created(report)) => {
            print_expansion(&report);
            Ok(())
        }
        Ok(SubmitOutcome::Updated(rule)) => {
            println!("Updated rule {}", rule.id);
            Ok(())
        }
        Err(e) => {
            if let Some(report) = manager.last_expansion() {
                print_expansion(report);
            }
            Err(e.into())
        }
    }
}

fn find_rule(manager: &RuleManager, id: RecordId) -> Result<FirewallRule> {
    manager
        .rules()
        .iter()
        .find(|rule| rule.id == id)
        .cloned()
        .ok_or_else(|| anyhow!("Rule {} not found", id))
}

fn print_rules(manager: &RuleManager) {
    if manager.rules().is_empty() {
        println!("No rules");
        return;
    }

    println!(
        "{:<6} {:<20} {:<24} {:<20} {:<6} {:<8} {}",
        "ID", "REMARK", "PROVIDER", "PORT", "PROTO", "ENABLED", "LAST IP"
    );
    for rule in manager.rules() {
        println!(
            "{:<6} {:<20} {:<24} {:<20} {:<6} {:<8} {}",
            rule.id,
            rule.remark,
            manager.full_provider_label(rule),
            rule.port,
            rule.protocol,
            rule.enabled,
            rule.last_ip
        );
    }
}

fn print_expansion(report: &ExpansionReport) {
    use fwsync_core::manager::CallStatus;

    for call in report.calls() {
        match &call.status {
            CallStatus::Created(rule) => println!("  created  {:<20} rule {}", call.port, rule.id),
            CallStatus::Failed(message) => println!("  failed   {:<20} {}", call.port, message),
            CallStatus::NotAttempted => println!("  skipped  {}", call.port),
        }
    }
    println!(
        "Created {} of {} rule(s)",
        report.created_count(),
        report.intended()
    );
}

async fn run_configs(command: ConfigsCommand, ctx: &Context) -> Result<()> {
    let (mut manager, mut events) = config_manager(ctx).await?;

    let result = match command {
        ConfigsCommand::List => {
            print_configs(&manager);
            Ok(())
        }
        ConfigsCommand::Add(args) => {
            manager.begin_create();
            save_config(&mut manager, args).await
        }
        ConfigsCommand::Edit { id, fields } => {
            let config = manager
                .configs()
                .iter()
                .find(|config| config.id == id)
                .cloned()
                .ok_or_else(|| anyhow!("Cloud config {} not found", id))?;
            manager.begin_edit(&config).await?;
            save_config(&mut manager, fields).await
        }
        ConfigsCommand::Delete { id } => {
            if manager.delete_config(id).await? {
                println!("Deleted cloud config {}", id);
            } else {
                println!("Cancelled");
            }
            Ok(())
        }
        ConfigsCommand::Test { id } => {
            let outcome = manager.test_config(id).await?;
            if outcome.success {
                println!("OK: {}", outcome.message);
                Ok(())
            } else {
                Err(anyhow!("Connection test failed: {}", outcome.message))
            }
        }
    };

    log_events(&mut events);
    result
}

/// Fill the open config form and submit it
async fn save_config(manager: &mut CloudConfigManager, args: ConfigArgs) -> Result<()> {
    let provider = ProviderId::from(args.provider);
    let unchanged = manager
        .form()
        .and_then(|form| form.provider.as_ref())
        .is_some_and(|current| *current == provider);
    if !unchanged {
        manager.select_provider(provider).await?;
    }

    if !manager.regions().is_empty()
        && !manager.regions().iter().any(|region| region.code == args.region)
    {
        tracing::warn!("Region {} is not listed for this provider", args.region);
    }

    let show_project_id = manager.show_project_id();
    let form = manager
        .form_mut()
        .ok_or_else(|| anyhow!("No cloud config form is open"))?;
    form.region = args.region;
    form.instance_id = args.instance;
    form.secret_id = args.secret_id;
    form.secret_key = args.secret_key;
    form.service_type = args.service_type;
    form.description = args.description;
    form.is_default = args.default;
    form.is_enabled = !args.disabled;
    if show_project_id {
        form.project_id = args.project_id;
    }

    let saved = manager.submit().await?;
    println!(
        "Saved cloud config {} ({})",
        saved.id,
        manager
            .catalog()
            .full_label(&saved.provider, saved.service_type)
    );
    Ok(())
}

fn print_configs(manager: &CloudConfigManager) {
    if manager.configs().is_empty() {
        println!("No cloud configs");
        return;
    }

    println!(
        "{:<6} {:<24} {:<16} {:<24} {:<16} {:<8} {:<8} {}",
        "ID", "PROVIDER", "REGION", "INSTANCE", "SECRET ID", "DEFAULT", "ENABLED", "DESCRIPTION"
    );
    for config in manager.configs() {
        print_config_row(manager.catalog(), config);
    }
}

fn print_config_row(catalog: &Catalog, config: &CloudConfig) {
    println!(
        "{:<6} {:<24} {:<16} {:<24} {:<16} {:<8} {:<8} {}",
        config.id,
        catalog.full_label(&config.provider, config.service_type),
        config.region,
        config.instance_id,
        mask_secret(&config.secret_id),
        config.is_default,
        config.is_enabled,
        config.description
    );
}

async fn list_providers(ctx: &Context) -> Result<()> {
    let (manager, mut events) = config_manager(ctx).await?;
    let catalog = manager.catalog();

    for key in manager.providers() {
        let provider = ProviderId::from(key.as_str());
        let marker = if catalog.is_supported_provider(&provider) { "" } else { " (unsupported)" };
        println!("{:<16} {}{}", key, catalog.display_name(&provider), marker);
        for subtype in catalog.service_subtypes(&provider) {
            println!(
                "  type {:<3} {:<12} multi-port: {:<5} {}",
                subtype.value,
                subtype.display_name,
                subtype.multi_port,
                subtype.description
            );
        }
    }

    log_events(&mut events);
    Ok(())
}

async fn list_regions(provider: &str, ctx: &Context) -> Result<()> {
    let regions = CloudConfigStore::regions(ctx.store.as_ref(), provider).await?;
    if regions.is_empty() {
        println!("No regions listed for {}", provider);
    }
    for region in regions {
        println!("{:<20} {}", region.code, region.name);
    }
    Ok(())
}

async fn run_settings(command: SettingsCommand, ctx: &Context) -> Result<()> {
    let (mut settings, mut events) = SettingsManager::new(ctx.store.clone(), &ctx.manager)?;
    settings.load().await.context("Failed to load settings")?;

    let result = match command {
        SettingsCommand::Show => {
            print_settings(&settings);
            Ok(())
        }
        SettingsCommand::Set {
            ip_fetch_url,
            interval,
            cron_enabled,
        } => {
            let mut config = settings.config().clone();
            if let Some(url) = ip_fetch_url {
                config.ip_fetch_url = url;
            }
            if let Some(interval) = interval {
                config.ip_check_interval = interval;
            }
            if let Some(enabled) = cron_enabled {
                config.cron_enabled = enabled;
            }
            settings.save(config).await?;
            print_settings(&settings);
            Ok(())
        }
        SettingsCommand::Sync => {
            let message = settings.sync_ip_now().await?;
            println!("{}", message);
            println!("Current IP: {}", settings.current_ip().unwrap_or("unknown"));
            Ok(())
        }
        SettingsCommand::Reset => {
            settings.reset();
            let defaults = settings.config().clone();
            settings.save(defaults).await?;
            print_settings(&settings);
            Ok(())
        }
    };

    log_events(&mut events);
    result
}

fn print_settings(settings: &SettingsManager) {
    let config = settings.config();
    println!("IP fetch URL:   {}", config.ip_fetch_url);
    println!("Check interval: {} min", config.ip_check_interval);
    println!("Scheduled:      {}", config.cron_enabled);
    println!("Current IP:     {}", settings.current_ip().unwrap_or("unknown"));
}
