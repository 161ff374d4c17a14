// ============================================================================
// white-rabbit - command-line shell for the White Rabbit core
// ============================================================================
// Usage:
//   white-rabbit init                         Write default records
//   white-rabbit status                       Show level, vitals and daily bonus
//   white-rabbit transform <mode> [TEXT...]   Rewrite/summarize/translate/explain
//   white-rabbit task generate <FILE>         Turn page text into a task (Premium)
//   white-rabbit task step <ID>               Complete a step of the current task
//   white-rabbit daily                        Claim the daily bonus
//   white-rabbit settings show|set|reset      Inspect or edit completion settings
//   white-rabbit rewards show|set|replace|reset  Inspect or edit the reward table
//   white-rabbit test-connection              Check API credentials
// ============================================================================

mod config;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rabbit_core::access::{gate_feature, upgrade_prompt, Feature, SubscriptionTier};
use rabbit_core::completion::{CancelToken, CompletionClient, SettingsCompleter};
use rabbit_core::progression::{self, reward_summary};
use rabbit_core::store::{self, RedbStore};
use rabbit_core::task::{generate_task, InteractiveTask};
use rabbit_core::{
    ActionKind, KnowledgeLevel, LearningStyle, Profile, RabbitError, RequestSlot, RewardBundle,
    RewardTable, Settings, LEVEL_XP_STEP, VITALS_MAX,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use config::{mask_secret, EnvConfig};

/// White Rabbit: transform text with an LLM and level up while you do it
#[derive(Parser)]
#[command(name = "white-rabbit", version, about = "Rewrite, summarize, translate and explain text with an OpenAI-compatible API")]
struct Cli {
    /// Path to the store file (default: ~/.white-rabbit/store.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Debug logging for the shell and core
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write default profile, settings, rewards and subscription if missing
    Init,

    /// Show profile, vitals and daily bonus status
    Status,

    /// Send text through a transform: rewrite, summarize, translate, explain-step-by-step
    Transform {
        mode: ActionKind,

        /// Text to transform (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,

        /// Print the answer as it streams in
        #[arg(long)]
        stream: bool,

        /// Do not grant the action's reward
        #[arg(long)]
        no_reward: bool,
    },

    /// Interactive learning tasks (Premium)
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Grant the reward bundle for an action
    Grant { action: String },

    /// Inspect or edit the reward table
    Rewards {
        #[command(subcommand)]
        command: RewardsCommand,
    },

    /// Claim the daily bonus
    Daily,

    /// Inspect or edit completion settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Update the learner fields used to personalize tasks
    Learner {
        #[arg(long)]
        knowledge_level: Option<KnowledgeLevel>,

        /// Comma-separated skills, e.g. "programming,design"
        #[arg(long)]
        skills: Option<String>,

        #[arg(long)]
        learning_style: Option<LearningStyle>,
    },

    /// Show or change the subscription tier
    Subscription { tier: Option<SubscriptionTier> },

    /// Send a minimal request to check the API key and endpoint
    TestConnection,

    /// Reset the profile to defaults and drop the current task
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Generate a task from a text file of page content
    Generate { file: PathBuf },

    /// Show the current task
    Show,

    /// Mark a step of the current task as completed
    Step { id: u32 },

    /// Drop the current task
    Clear,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print stored settings (env overrides applied)
    Show,

    /// Set one field: apiKey, baseUrl, model, temperature, defaultTone, defaultLanguage, systemPrompt
    Set { key: String, value: String },

    /// Restore default settings
    Reset,
}

#[derive(Subcommand)]
enum RewardsCommand {
    /// Print the reward table as JSON
    Show,

    /// Set one action's bundle, e.g. `rewards set rewrite '{"xp": 10, "coins": 3}'`
    Set { action: String, json: String },

    /// Replace the whole table with a JSON mapping of action to bundle
    Replace { json: String },

    /// Restore the default reward table
    Reset,
}

/// Everything a command needs, built once at startup
struct Shell {
    store: RedbStore,
    env: EnvConfig,
    client: CompletionClient,
    slot: Arc<RequestSlot>,
}

impl Shell {
    /// Stored settings with environment overrides
    fn settings(&self) -> Result<Settings> {
        Ok(self.env.apply(store::load_settings(&self.store)?))
    }

    /// Apply the named reward to the stored profile
    fn grant(&self, action: &str) -> Result<String> {
        let rewards = store::load_rewards(&self.store)?;
        let profile = store::load_profile(&self.store)?;

        let bundle = rewards.bundle_for(action);
        let outcome = progression::apply_rewards(&profile, &bundle);
        store::save_profile(&self.store, &outcome.profile)?;

        if outcome.leveled_up {
            info!("Level up to {}", outcome.profile.level);
        }
        Ok(reward_summary(&bundle, &outcome))
    }

    /// Hand out a token for one request; Ctrl-C cancels it while it is held
    fn begin_request(&self) -> CancelToken {
        self.slot.begin()
    }

    fn end_request(&self, token: &CancelToken) {
        self.slot.finish(token);
    }
}

/// What a Ctrl-C does at the moment it arrives
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    CancelledRequest,
    Exit,
}

fn on_interrupt(slot: &RequestSlot) -> Interrupt {
    if slot.cancel() {
        Interrupt::CancelledRequest
    } else {
        Interrupt::Exit
    }
}

/// Listen for Ctrl-C for the whole process. Once tokio owns SIGINT the
/// default handler is gone, so outside a request we exit like it would.
fn spawn_interrupt_handler(slot: Arc<RequestSlot>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match on_interrupt(&slot) {
                Interrupt::CancelledRequest => info!("Interrupted, cancelling request"),
                Interrupt::Exit => std::process::exit(130),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("rabbit_cli={}", level).parse()?)
                .add_directive(format!("rabbit_core={}", level).parse()?),
        )
        .init();

    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<RabbitError>() {
            Some(err) if err.is_cancelled() => {
                info!("Request cancelled");
                Ok(())
            }
            Some(err) if err.is_configuration() => {
                eprintln!("{}", err);
                eprintln!(
                    "Hint: set WHITE_RABBIT_API_KEY (or OPENAI_API_KEY), or run `white-rabbit settings set apiKey <key>`"
                );
                std::process::exit(2);
            }
            _ => Err(e),
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let env = EnvConfig::from_env();
    let db_path = env.resolve_db_path(cli.db_path.as_deref())?;
    let store = RedbStore::open(&db_path)?;
    let client = CompletionClient::new().with_retry(env.retry_config());

    let shell = Shell {
        store,
        env,
        client,
        slot: Arc::new(RequestSlot::new()),
    };
    spawn_interrupt_handler(shell.slot.clone());

    dispatch(&shell, cli.command).await
}

async fn dispatch(shell: &Shell, command: Commands) -> Result<()> {
    match command {
        Commands::Init => cmd_init(shell),
        Commands::Status => cmd_status(shell),
        Commands::Transform {
            mode,
            text,
            stream,
            no_reward,
        } => cmd_transform(shell, mode, text, stream, no_reward).await,
        Commands::Task { command } => match command {
            TaskCommand::Generate { file } => cmd_task_generate(shell, &file).await,
            TaskCommand::Show => cmd_task_show(shell),
            TaskCommand::Step { id } => cmd_task_step(shell, id),
            TaskCommand::Clear => {
                store::save_current_task(&shell.store, None)?;
                println!("Current task cleared.");
                Ok(())
            }
        },
        Commands::Grant { action } => {
            println!("{}", shell.grant(&action)?);
            Ok(())
        }
        Commands::Rewards { command } => match command {
            RewardsCommand::Show => cmd_rewards_show(shell),
            RewardsCommand::Set { action, json } => cmd_rewards_set(shell, &action, &json),
            RewardsCommand::Replace { json } => cmd_rewards_replace(shell, &json),
            RewardsCommand::Reset => {
                store::save_rewards(&shell.store, &RewardTable::default())?;
                println!("Reward table reset to defaults.");
                Ok(())
            }
        },
        Commands::Daily => cmd_daily(shell),
        Commands::Settings { command } => match command {
            SettingsCommand::Show => cmd_settings_show(shell),
            SettingsCommand::Set { key, value } => cmd_settings_set(shell, &key, &value),
            SettingsCommand::Reset => {
                store::save_settings(&shell.store, &Settings::default())?;
                println!("Settings reset to defaults.");
                Ok(())
            }
        },
        Commands::Learner {
            knowledge_level,
            skills,
            learning_style,
        } => cmd_learner(shell, knowledge_level, skills, learning_style),
        Commands::Subscription { tier } => cmd_subscription(shell, tier),
        Commands::TestConnection => cmd_test_connection(shell).await,
        Commands::Reset { yes } => cmd_reset(shell, yes),
    }
}

fn cmd_init(shell: &Shell) -> Result<()> {
    let written = store::init_defaults(&shell.store)?;

    println!("Store: {}", shell.store.path().display());
    if written.is_empty() {
        println!("Already initialized.");
    } else {
        println!("Initialized: {}", written.join(", "));
    }
    Ok(())
}

fn cmd_status(shell: &Shell) -> Result<()> {
    let profile = store::load_profile(&shell.store)?;
    let tier = store::load_subscription(&shell.store)?;
    let now = Utc::now();

    println!("=== White Rabbit ===");
    println!(
        "Level {}  ({}/{} xp, {} to next level)",
        profile.level,
        profile.xp,
        LEVEL_XP_STEP * profile.level.max(1),
        profile.xp_to_next_level()
    );
    println!("Coins:  {}", profile.coins);
    println!("Health: {}/{}", profile.health, VITALS_MAX);
    println!("Food:   {}/{}", profile.food, VITALS_MAX);
    println!("Streak: {}", profile.streak);

    match progression::hours_until_daily(&profile, now) {
        None => println!("Daily bonus: available"),
        Some(hours) => println!("Daily bonus: in {}h", hours),
    }

    println!();
    print_learner(&profile);
    println!("Plan: {}", tier.display_name());
    Ok(())
}

fn print_learner(profile: &Profile) {
    println!("Knowledge level: {}", profile.knowledge_level.as_str());
    println!("Skills:          {}", profile.skills.join(", "));
    println!("Learning style:  {}", profile.learning_style.as_str());
}

async fn cmd_transform(
    shell: &Shell,
    mode: ActionKind,
    text: Vec<String>,
    stream: bool,
    no_reward: bool,
) -> Result<()> {
    if !mode.is_transform() {
        anyhow::bail!(
            "'{}' is not a transform. Use rewrite, summarize, translate or explain-step-by-step",
            mode
        );
    }

    let text = if text.is_empty() {
        std::io::read_to_string(std::io::stdin())
            .map_err(|e| anyhow!("Failed to read stdin: {}", e))?
    } else {
        text.join(" ")
    };
    if text.trim().is_empty() {
        anyhow::bail!("Nothing to transform");
    }

    let settings = shell.settings()?;
    let token = shell.begin_request();

    let result = if stream {
        let mut out = std::io::stdout();
        let mut print_delta = move |delta: &str, _accumulated: &str| {
            let _ = write!(out, "{}", delta);
            let _ = out.flush();
        };
        shell
            .client
            .transform(&settings, mode, &text, &token, Some(&mut print_delta))
            .await
            .map(|_| println!())
    } else {
        shell
            .client
            .transform(&settings, mode, &text, &token, None)
            .await
            .map(|answer| println!("{}", answer))
    };

    shell.end_request(&token);
    result?;

    if !no_reward {
        println!("\n{}", shell.grant(mode.as_str())?);
    }
    Ok(())
}

async fn cmd_task_generate(shell: &Shell, file: &Path) -> Result<()> {
    let tier = store::load_subscription(&shell.store)?;
    if let Err(locked) = gate_feature(tier, Feature::InteractiveTasks) {
        let prompt = locked.upgrade_prompt();
        println!("{}", prompt.title);
        println!("{}", prompt.description);
        for feature in &prompt.features {
            println!("  - {}", feature);
        }
        return Ok(());
    }

    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow!("Failed to read {}: {}", file.display(), e))?;
    if content.trim().is_empty() {
        anyhow::bail!("{} is empty", file.display());
    }

    let settings = shell.settings()?;
    let profile = store::load_profile(&shell.store)?;
    let token = shell.begin_request();

    let completer = SettingsCompleter::new(&shell.client, &settings, &token);
    let result = generate_task(&content, &profile, &completer).await;

    shell.end_request(&token);
    let task = result?;

    store::save_current_task(&shell.store, Some(&task))?;
    print_task(&task);
    Ok(())
}

fn cmd_task_show(shell: &Shell) -> Result<()> {
    match store::load_current_task(&shell.store)? {
        Some(task) => print_task(&task),
        None => println!("No current task. Run `white-rabbit task generate <FILE>`."),
    }
    Ok(())
}

fn cmd_task_step(shell: &Shell, id: u32) -> Result<()> {
    let mut task = store::load_current_task(&shell.store)?
        .ok_or_else(|| anyhow!("No current task"))?;

    if !task.steps.iter().any(|s| s.id == id) {
        anyhow::bail!("Task has no step {}", id);
    }
    if !task.complete_step(id) {
        println!("Step {} is already completed.", id);
        return Ok(());
    }

    // Step state is stored before any reward is granted
    store::save_current_task(&shell.store, Some(&task))?;

    println!("{}", shell.grant(ActionKind::CompleteStep.as_str())?);
    if task.is_finished() {
        println!("Task complete! {}", shell.grant(ActionKind::InteractiveTask.as_str())?);
    }

    let (done, total) = task.progress();
    println!("Progress: {}/{}", done, total);
    Ok(())
}

fn print_task(task: &InteractiveTask) {
    let (done, total) = task.progress();

    println!("=== {} ===", task.title);
    if !task.description.is_empty() {
        println!("{}", task.description);
    }
    if !task.estimated_time.is_empty() {
        println!("Estimated time: {}", task.estimated_time);
    }
    println!("Progress: {}/{}\n", done, total);

    for step in &task.steps {
        let mark = if step.completed { "x" } else { " " };
        println!(
            "[{}] {}. {} ({})",
            mark,
            step.id,
            step.title,
            step.step_type.as_str()
        );
        if !step.description.is_empty() {
            println!("      {}", step.description);
        }
        if let Some(query) = &step.search_query {
            println!("      search: {}", query);
        }
        if let Some(link) = &step.external_link {
            println!("      link: {}", link);
        }
    }

    if !task.resources.is_empty() {
        println!("\nResources:");
        for resource in &task.resources {
            println!("  - {} <{}> [{}]", resource.title, resource.url, resource.resource_type);
        }
    }
}

fn cmd_daily(shell: &Shell) -> Result<()> {
    let profile = store::load_profile(&shell.store)?;
    let rewards = store::load_rewards(&shell.store)?;

    match progression::claim_daily_bonus(&profile, &rewards, Utc::now()) {
        Ok(outcome) => {
            store::save_profile(&shell.store, &outcome.profile)?;
            let bundle = rewards.bundle(ActionKind::Daily);
            println!("Daily bonus claimed! Streak: {}", outcome.profile.streak);
            println!("{}", reward_summary(&bundle, &outcome));
        }
        Err(not_ready) => println!("{}", not_ready),
    }
    Ok(())
}

fn cmd_settings_show(shell: &Shell) -> Result<()> {
    let settings = shell.settings()?;

    println!("apiKey:          {}", mask_secret(&settings.api_key));
    println!("baseUrl:         {}", settings.base_url);
    println!("model:           {}", settings.model);
    println!("temperature:     {}", settings.temperature);
    println!("defaultTone:     {}", settings.default_tone);
    println!("defaultLanguage: {}", settings.default_language);
    println!("systemPrompt:    {}", settings.system_prompt);

    for problem in settings.validate() {
        println!("! {}", problem);
    }
    Ok(())
}

fn cmd_settings_set(shell: &Shell, key: &str, value: &str) -> Result<()> {
    let mut settings = store::load_settings(&shell.store)?;

    match key {
        "apiKey" => settings.api_key = value.to_string(),
        "baseUrl" => settings.base_url = value.to_string(),
        "model" => settings.model = value.to_string(),
        "temperature" => {
            settings.temperature = value
                .parse()
                .map_err(|e| anyhow!("Invalid temperature '{}': {}", value, e))?
        }
        "defaultTone" => settings.default_tone = value.to_string(),
        "defaultLanguage" => settings.default_language = value.to_string(),
        "systemPrompt" => settings.system_prompt = value.to_string(),
        _ => anyhow::bail!(
            "Unknown setting '{}'. Valid keys: apiKey, baseUrl, model, temperature, defaultTone, defaultLanguage, systemPrompt",
            key
        ),
    }

    for problem in settings.validate() {
        warn!("{}", problem);
    }

    store::save_settings(&shell.store, &settings)?;
    println!("Saved {}.", key);
    Ok(())
}

fn cmd_rewards_show(shell: &Shell) -> Result<()> {
    let rewards = store::load_rewards(&shell.store)?;
    let sorted: std::collections::BTreeMap<_, _> = rewards.0.iter().collect();
    println!("{}", serde_json::to_string_pretty(&sorted)?);
    Ok(())
}

fn cmd_rewards_set(shell: &Shell, action: &str, json: &str) -> Result<()> {
    let action = action.trim();
    if action.is_empty() {
        anyhow::bail!("Action name is required");
    }
    let bundle = RewardBundle::from_json(json).map_err(|e| anyhow!("{}", e))?;

    let mut rewards = store::load_rewards(&shell.store)?;
    rewards.set_bundle(action, bundle);
    store::save_rewards(&shell.store, &rewards)?;

    println!(
        "{}: xp {} coins {} health {} food {}",
        action, bundle.xp, bundle.coins, bundle.health, bundle.food
    );
    Ok(())
}

fn cmd_rewards_replace(shell: &Shell, json: &str) -> Result<()> {
    let rewards = RewardTable::from_json(json).map_err(|e| anyhow!("{}", e))?;
    store::save_rewards(&shell.store, &rewards)?;
    println!("Saved {} reward entries.", rewards.0.len());
    Ok(())
}

fn cmd_learner(
    shell: &Shell,
    knowledge_level: Option<KnowledgeLevel>,
    skills: Option<String>,
    learning_style: Option<LearningStyle>,
) -> Result<()> {
    let mut profile = store::load_profile(&shell.store)?;

    if let Some(level) = knowledge_level {
        profile.knowledge_level = level;
    }
    if let Some(skills) = skills {
        let skills: Vec<String> = skills
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if skills.is_empty() {
            anyhow::bail!("At least one skill is required");
        }
        profile.skills = skills;
    }
    if let Some(style) = learning_style {
        profile.learning_style = style;
    }

    store::save_profile(&shell.store, &profile)?;
    print_learner(&profile);
    Ok(())
}

fn cmd_subscription(shell: &Shell, tier: Option<SubscriptionTier>) -> Result<()> {
    match tier {
        Some(tier) => {
            store::save_subscription(&shell.store, tier)?;
            println!("Plan set to {}.", tier.display_name());
        }
        None => {
            let tier = store::load_subscription(&shell.store)?;
            println!("Plan: {}", tier.display_name());
            if !tier.is_premium() {
                println!("{}", upgrade_prompt().description);
            }
        }
    }
    Ok(())
}

async fn cmd_test_connection(shell: &Shell) -> Result<()> {
    let settings = shell.settings()?;
    let token = shell.begin_request();

    let result = shell.client.test_connection(&settings, &token).await;
    shell.end_request(&token);

    match result {
        Ok(()) => {
            println!("Connection OK ({} at {})", settings.model, settings.base_url);
            Ok(())
        }
        Err(e) if e.is_cancelled() || e.is_configuration() => Err(e.into()),
        Err(e) => {
            println!("Connection failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_reset(shell: &Shell, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("This resets level, xp, coins and streak. Pass --yes to confirm.");
    }

    store::save_profile(&shell.store, &Profile::default())?;
    store::save_current_task(&shell.store, None)?;
    println!("Profile reset.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transform() {
        let cli = Cli::try_parse_from([
            "white-rabbit",
            "transform",
            "--stream",
            "explain-step-by-step",
            "how",
            "tides",
            "work",
        ])
        .unwrap();

        match cli.command {
            Commands::Transform { mode, text, stream, no_reward } => {
                assert_eq!(mode, ActionKind::ExplainStepByStep);
                assert_eq!(text, vec!["how", "tides", "work"]);
                assert!(stream);
                assert!(!no_reward);
            }
            _ => panic!("expected transform"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["white-rabbit", "transform", "shout", "hi"]).is_err());
    }

    fn shell(dir: &tempfile::TempDir) -> Shell {
        let shell = Shell {
            store: RedbStore::open(dir.path().join("store.redb")).unwrap(),
            env: EnvConfig::default(),
            client: CompletionClient::new(),
            slot: Arc::new(RequestSlot::new()),
        };
        store::init_defaults(&shell.store).unwrap();
        shell
    }

    fn two_step_task() -> InteractiveTask {
        rabbit_core::task::parse_task_response(
            r#"{"title": "Tea", "steps": [{"title": "Boil"}, {"title": "Steep"}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_grant_updates_stored_profile() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(&dir);

        let summary = shell.grant("rewrite").unwrap();
        assert_eq!(summary, "Earned: +8 xp +3 coins +1 health +1 food");

        let profile = store::load_profile(&shell.store).unwrap();
        assert_eq!(profile.xp, 8);
        assert_eq!(profile.coins, 13);
    }

    #[test]
    fn test_rewards_set_and_replace() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(&dir);

        cmd_rewards_set(&shell, "rewrite", r#"{"xp": 20, "coins": 1}"#).unwrap();
        cmd_rewards_set(&shell, "podcast", r#"{"xp": 5}"#).unwrap();
        let rewards = store::load_rewards(&shell.store).unwrap();
        assert_eq!(rewards.bundle(ActionKind::Rewrite), RewardBundle::new(20, 1, 0, 0));
        assert_eq!(rewards.bundle_for("podcast").xp, 5);
        assert_eq!(rewards.bundle(ActionKind::Daily).xp, 10);

        cmd_rewards_replace(&shell, r#"{"daily": {"xp": 1}}"#).unwrap();
        let rewards = store::load_rewards(&shell.store).unwrap();
        assert_eq!(rewards.0.len(), 1);
        assert_eq!(rewards.bundle(ActionKind::Rewrite), RewardBundle::default());
    }

    #[test]
    fn test_invalid_rewards_json_leaves_table_alone() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(&dir);

        let err = cmd_rewards_replace(&shell, "{not json").unwrap_err();
        assert!(err.to_string().contains("Invalid rewards JSON format"));
        assert!(cmd_rewards_set(&shell, "rewrite", r#"{"xp": "ten"}"#).is_err());

        assert_eq!(store::load_rewards(&shell.store).unwrap(), RewardTable::default());
    }

    #[test]
    fn test_parse_settings_and_rewards_reset() {
        let cli = Cli::try_parse_from(["white-rabbit", "settings", "reset"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Settings {
                command: SettingsCommand::Reset
            }
        ));
        let cli = Cli::try_parse_from(["white-rabbit", "rewards", "reset"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Rewards {
                command: RewardsCommand::Reset
            }
        ));
    }

    #[tokio::test]
    async fn test_settings_and_rewards_reset_restore_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(&dir);
        cmd_settings_set(&shell, "model", "gpt-4o").unwrap();
        cmd_rewards_set(&shell, "rewrite", r#"{"xp": 99}"#).unwrap();

        for args in [["white-rabbit", "settings", "reset"], ["white-rabbit", "rewards", "reset"]] {
            let cli = Cli::try_parse_from(args).unwrap();
            dispatch(&shell, cli.command).await.unwrap();
        }

        assert_eq!(store::load_settings(&shell.store).unwrap(), Settings::default());
        assert_eq!(store::load_rewards(&shell.store).unwrap(), RewardTable::default());
    }

    #[test]
    fn test_task_step_pays_once_and_finishes_task() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(&dir);
        store::save_current_task(&shell.store, Some(&two_step_task())).unwrap();

        cmd_task_step(&shell, 1).unwrap();
        let task = store::load_current_task(&shell.store).unwrap().unwrap();
        assert!(task.steps[0].completed);
        assert_eq!(store::load_profile(&shell.store).unwrap().xp, 3);

        // Completed steps earn nothing the second time
        cmd_task_step(&shell, 1).unwrap();
        assert_eq!(store::load_profile(&shell.store).unwrap().xp, 3);

        // Last step adds the step and the task rewards
        cmd_task_step(&shell, 2).unwrap();
        assert!(store::load_current_task(&shell.store).unwrap().unwrap().is_finished());
        assert_eq!(store::load_profile(&shell.store).unwrap().xp, 3 + 3 + 15);

        assert!(cmd_task_step(&shell, 9).is_err());
    }

    #[test]
    fn test_interrupt_cancels_active_request_else_exits() {
        let slot = RequestSlot::new();
        assert_eq!(on_interrupt(&slot), Interrupt::Exit);

        let token = slot.begin();
        assert_eq!(on_interrupt(&slot), Interrupt::CancelledRequest);
        assert!(token.is_cancelled());

        // The request is gone, so the next Ctrl-C exits
        assert_eq!(on_interrupt(&slot), Interrupt::Exit);
    }
}
