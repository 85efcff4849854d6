use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use provador_contracts::chat::{parse_intent, ChatRole, ChatTurn, CHAT_HELP_COMMANDS};
use provador_contracts::events::{new_session_id, now_utc_iso, SessionEvent, SessionLog};
use provador_contracts::summary::write_summary;
use provador_contracts::poses::instruction_for;
use provador_contracts::{ClothingDescription, ImageAsset, Pose, TryOnError};
use provador_engine::config::CONFIG_ERROR_SCREEN;
use provador_engine::fetch::fetch_image;
use provador_engine::{build_client, ClientKind, Completion, EngineConfig, GenerationClient, Orchestrator};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "provador", version, about = "Provador virtual com IA generativa")]
struct Cli {
    /// Use the offline client (no credential, no network).
    #[arg(long, global = true)]
    dryrun: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    TryOn(TryOnArgs),
    Describe(DescribeArgs),
    Poses(PosesArgs),
    Chat(ChatArgs),
}

#[derive(Debug, Parser)]
struct TryOnArgs {
    /// Path or http(s) URL of the person photo.
    #[arg(long)]
    person: String,
    /// Path or http(s) URL of the clothing photo.
    #[arg(long)]
    clothing: String,
    /// Extra poses to render after the default one (slug or label).
    #[arg(long = "pose")]
    poses: Vec<String>,
    #[arg(long)]
    accessory: Option<String>,
    /// Also write a before/after image split at this fraction.
    #[arg(long)]
    compare: Option<f64>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct DescribeArgs {
    #[arg(long)]
    clothing: String,
}

#[derive(Debug, Parser)]
struct PosesArgs {
    /// Print the instruction sent for this pose (slug or label).
    name: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    person: Option<String>,
    #[arg(long)]
    clothing: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

type Session = Orchestrator<Box<dyn GenerationClient>>;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("provador error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Command::Poses(args) = &cli.command {
        match args.name.as_deref() {
            Some(name) => println!("{}", instruction_for(name)),
            None => print_pose_list(None),
        }
        return Ok(0);
    }

    let config = if cli.dryrun {
        EngineConfig::dryrun()
    } else {
        EngineConfig::from_env()
    };
    let client = match build_client(&config) {
        Ok(client) => client,
        Err(TryOnError::Configuration(screen)) => {
            eprintln!("{screen}");
            return Ok(2);
        }
        Err(err) => return Err(err.into()),
    };
    let http = HttpClient::builder()
        .timeout(config.request_timeout)
        .build()
        .context("failed to build http client")?;

    match cli.command {
        Command::TryOn(args) => run_try_on(args, client, &http, config.client),
        Command::Describe(args) => run_describe(args, client.as_ref(), &http),
        Command::Chat(args) => run_chat(args, client, &http, config.client),
        Command::Poses(_) => Ok(0),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "provador=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn run_try_on(
    args: TryOnArgs,
    client: Box<dyn GenerationClient>,
    http: &HttpClient,
    kind: ClientKind,
) -> Result<i32> {
    let extra_poses = args
        .poses
        .iter()
        .map(|raw| raw.parse::<Pose>())
        .collect::<Result<Vec<Pose>, _>>()?;
    let out_dir = out_dir_or_default(args.out);
    let events_path = args.events.unwrap_or_else(|| out_dir.join("events.jsonl"));
    let mut session = SessionRun::start(client, &out_dir, &events_path, kind)?;

    let person = load_image(http, &args.person)?;
    session.orchestrator.upload_person(person);
    let clothing = load_image(http, &args.clothing)?;
    if let Some(description) = session.orchestrator.describe_clothing(clothing).applied() {
        print_description(&description);
    }

    let code = session.try_on(&extra_poses, args.accessory.as_deref(), args.compare, http);
    session.finish()?;
    code
}

struct SessionRun {
    orchestrator: Session,
    out_dir: PathBuf,
    log: SessionLog,
    started_at: String,
}

impl SessionRun {
    fn start(
        client: Box<dyn GenerationClient>,
        out_dir: &Path,
        events_path: &Path,
        kind: ClientKind,
    ) -> Result<Self> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let log = SessionLog::new(events_path, new_session_id());
        log.emit(
            SessionEvent::SessionStarted,
            json_object(json!({
                "client": client.name(),
                "dryrun": kind == ClientKind::Dryrun,
                "out_dir": out_dir.to_string_lossy().to_string(),
            })),
        )?;
        Ok(Self {
            orchestrator: Orchestrator::new(client).with_log(log.clone()),
            out_dir: out_dir.to_path_buf(),
            log,
            started_at: now_utc_iso(),
        })
    }

    fn try_on(
        &mut self,
        extra_poses: &[Pose],
        accessory: Option<&str>,
        compare: Option<f64>,
        http: &HttpClient,
    ) -> Result<i32> {
        if let Err(err) = self.orchestrator.generate() {
            self.report_failure(&err);
            return Ok(1);
        }
        self.save_current(None)?;

        for pose in extra_poses {
            match self.orchestrator.change_pose(*pose) {
                Ok(_) => {
                    self.save_current(None)?;
                }
                Err(err) => {
                    self.report_failure(&err);
                    return Ok(1);
                }
            }
        }

        if let Some(source) = accessory {
            let accessory = load_image(http, source)?;
            if let Err(err) = self.orchestrator.add_accessory(accessory) {
                self.report_failure(&err);
                return Ok(1);
            }
            self.save_current(Some("acessorio"))?;
        }

        if let Some(split) = compare {
            let composed = self.orchestrator.compare(split)?;
            let path = self.out_dir.join("antes-depois.png");
            composed.write_to(&path)?;
            println!("Comparação salva em {}", path.display());
        }
        Ok(0)
    }

    /// Writes the image for the selected pose as `<slug>[-suffix].<ext>`.
    fn save_current(&self, suffix: Option<&str>) -> Result<PathBuf> {
        let pose = self.orchestrator.state().selected_pose();
        let Some(image) = self.orchestrator.current_result() else {
            bail!("no result for pose {}", pose.slug());
        };
        let stem = match suffix {
            Some(suffix) => format!("{}-{suffix}", pose.slug()),
            None => pose.slug().to_string(),
        };
        let path = self
            .out_dir
            .join(format!("{stem}.{}", image.extension()));
        image.write_to(&path)?;
        println!("{} → {}", pose.label(), path.display());
        Ok(path)
    }

    fn report_failure(&self, err: &TryOnError) {
        match self.orchestrator.state().error() {
            Some(failure) => eprintln!("{failure}"),
            None => eprintln!("{err}"),
        }
    }

    fn finish(&self) -> Result<()> {
        let summary = self
            .orchestrator
            .summary(self.log.session_id(), &self.started_at);
        let mut extra = Map::new();
        extra.insert(
            "out_dir".to_string(),
            Value::String(self.out_dir.to_string_lossy().to_string()),
        );
        extra.insert(
            "client".to_string(),
            Value::String(self.orchestrator.client().name().to_string()),
        );
        write_summary(&self.out_dir.join("summary.json"), &summary, Some(&extra))?;
        self.log.emit(
            SessionEvent::SessionFinished,
            json_object(json!({
                "poses_generated": summary.poses_generated.len(),
                "chat_turns": summary.chat_turns,
            })),
        )?;
        Ok(())
    }
}

fn run_describe(args: DescribeArgs, client: &dyn GenerationClient, http: &HttpClient) -> Result<i32> {
    let clothing = load_image(http, &args.clothing)?;
    let description = client.describe(&clothing).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "clothing description failed; using fallback");
        ClothingDescription::fallback()
    });
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(0)
}

fn run_chat(
    args: ChatArgs,
    client: Box<dyn GenerationClient>,
    http: &HttpClient,
    kind: ClientKind,
) -> Result<i32> {
    let out_dir = out_dir_or_default(args.out);
    let events_path = args.events.unwrap_or_else(|| out_dir.join("events.jsonl"));
    let mut session = SessionRun::start(client, &out_dir, &events_path, kind)?;

    if let Some(source) = args.person.as_deref() {
        session.orchestrator.upload_person(load_image(http, source)?);
    }
    if let Some(source) = args.clothing.as_deref() {
        let clothing = load_image(http, source)?;
        if let Some(description) = session.orchestrator.describe_clothing(clothing).applied() {
            print_description(&description);
        }
    }

    let stdin = io::stdin();
    let mut line = String::new();
    println!("Provador iniciado. Digite /help para ver os comandos.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        match intent.action.as_str() {
            "noop" => continue,
            "help" => {
                println!("Comandos: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            "quit" => break,
            "set_person" => {
                let Some(source) = intent.arg_str("path") else {
                    println!("/person requer um caminho ou URL");
                    continue;
                };
                match load_image(http, source) {
                    Ok(person) => {
                        session.orchestrator.upload_person(person);
                        println!("Foto carregada. Use /generate para provar a roupa.");
                    }
                    Err(err) => println!("{err:#}"),
                }
            }
            "set_clothing" => {
                let Some(source) = intent.arg_str("path") else {
                    println!("/clothing requer um caminho ou URL");
                    continue;
                };
                match load_image(http, source) {
                    Ok(clothing) => {
                        if let Some(description) =
                            session.orchestrator.describe_clothing(clothing).applied()
                        {
                            print_description(&description);
                        }
                    }
                    Err(err) => println!("{err:#}"),
                }
            }
            "generate" => {
                println!("Gerando o seu look...");
                match session.orchestrator.generate() {
                    Ok(Completion::Applied(_)) => {
                        session.save_current(None)?;
                        if let Some(turn) = session.orchestrator.state().transcript().last() {
                            print_turn(turn);
                        }
                    }
                    Ok(Completion::Stale) => {}
                    Err(err) => session.report_failure(&err),
                }
            }
            "change_pose" => {
                let pose = match intent.arg_str("pose").unwrap_or_default().parse::<Pose>() {
                    Ok(pose) => pose,
                    Err(err) => {
                        println!("{err}. Use /poses para ver as opções.");
                        continue;
                    }
                };
                match session.orchestrator.change_pose(pose) {
                    Ok(Completion::Applied(_)) => {
                        session.save_current(None)?;
                    }
                    Ok(Completion::Stale) => {}
                    Err(err) => session.report_failure(&err),
                }
            }
            "list_poses" => {
                print_pose_list(Some(&session.orchestrator));
            }
            "add_accessory" => {
                let Some(source) = intent.arg_str("path") else {
                    println!("/accessory requer um caminho ou URL");
                    continue;
                };
                let accessory = match load_image(http, source) {
                    Ok(accessory) => accessory,
                    Err(err) => {
                        println!("{err:#}");
                        continue;
                    }
                };
                match session.orchestrator.add_accessory(accessory) {
                    Ok(Completion::Applied(_)) => {
                        session.save_current(Some("acessorio"))?;
                    }
                    Ok(Completion::Stale) => {}
                    Err(err) => session.report_failure(&err),
                }
            }
            "show_description" => match session.orchestrator.state().description() {
                Some(description) => print_description(description),
                None if session.orchestrator.state().is_describing() => {
                    println!("Analisando a peça...")
                }
                None => println!("Nenhuma peça carregada. Use /clothing."),
            },
            "ask" => {
                let question = intent.question.clone().unwrap_or_default();
                match session.orchestrator.send_chat(&question) {
                    Ok(Completion::Applied(turn)) => print_turn(&turn),
                    Ok(Completion::Stale) => {}
                    Err(err) => println!("{err}"),
                }
            }
            "compare" => {
                let split = intent.arg_f64("split").unwrap_or(0.5);
                let path = intent
                    .arg_str("path")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| session.out_dir.join("antes-depois.png"));
                match session.orchestrator.compare(split) {
                    Ok(composed) => {
                        composed.write_to(&path)?;
                        println!("Comparação salva em {}", path.display());
                    }
                    Err(err) => println!("{err}"),
                }
            }
            "save_result" => {
                let Some(image) = session.orchestrator.current_result() else {
                    println!("{}", TryOnError::MissingResult);
                    continue;
                };
                let path = match intent.arg_str("path") {
                    Some(path) => PathBuf::from(path),
                    None => session.out_dir.join(format!(
                        "{}.{}",
                        session.orchestrator.state().selected_pose().slug(),
                        image.extension()
                    )),
                };
                image.write_to(&path)?;
                println!("Imagem salva em {}", path.display());
            }
            "status" => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&session.orchestrator.snapshot())?
                );
            }
            "unknown" => {
                let command = intent.arg_str("command").unwrap_or_default();
                println!("Comando desconhecido: /{command}. Use /help.");
            }
            other => {
                tracing::debug!(action = other, "unhandled chat action");
            }
        }
    }

    session.finish()?;
    Ok(0)
}

/// Paths are read from disk; http(s) sources go through the URL fetcher.
fn load_image(http: &HttpClient, source: &str) -> Result<ImageAsset> {
    let source = source.trim();
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(fetch_image(http, source)?);
    }
    let path = Path::new(source);
    ImageAsset::from_path(path).with_context(|| format!("failed to load {}", path.display()))
}

fn out_dir_or_default(out: Option<PathBuf>) -> PathBuf {
    out.unwrap_or_else(|| {
        PathBuf::from("runs").join(format!("provador-{}", Utc::now().format("%Y%m%d-%H%M%S")))
    })
}

fn print_pose_list(session: Option<&Session>) {
    for pose in Pose::ALL {
        let marker = match session {
            Some(session) if session.state().selected_pose() == pose => "*",
            Some(session) if session.state().results().contains(pose) => "+",
            _ => " ",
        };
        println!("{marker} {:<20} {}", pose.slug(), pose.label());
    }
}

fn print_description(description: &ClothingDescription) {
    println!("{}", description.name);
    println!("  {}", description.description);
    println!("  Ocasiões: {}", description.occasions);
}

fn print_turn(turn: &ChatTurn) {
    match turn.role {
        ChatRole::User => println!("Você: {}", turn.content),
        ChatRole::Assistant => println!("Estilista: {}", turn.content),
    }
}

fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use provador_contracts::Pose;

    use super::{json_object, out_dir_or_default, Cli, Command};

    #[test]
    fn try_on_flags_parse() {
        let cli = Cli::try_parse_from([
            "provador",
            "--dryrun",
            "try-on",
            "--person",
            "eu.jpg",
            "--clothing",
            "https://loja.test/vestido.png",
            "--pose",
            "hand-on-waist",
            "--pose",
            "Perfil Pensativo",
            "--compare",
            "0.4",
        ])
        .unwrap();
        assert!(cli.dryrun);
        let Command::TryOn(args) = cli.command else {
            panic!("expected try-on");
        };
        assert_eq!(args.poses, vec!["hand-on-waist", "Perfil Pensativo"]);
        assert_eq!(args.compare, Some(0.4));
        assert!(args.accessory.is_none());
    }

    #[test]
    fn pose_arguments_accept_slug_or_label() -> anyhow::Result<()> {
        assert_eq!("casual-crossed".parse::<Pose>()?, Pose::CasualCrossed);
        assert_eq!("mão na cintura".parse::<Pose>()?, Pose::HandOnWaist);
        let err = "sentada".parse::<Pose>().unwrap_err();
        assert!(err.to_string().contains("'sentada'"));
        assert!(err.to_string().contains("standard"));
        Ok(())
    }

    #[test]
    fn poses_takes_an_optional_name() {
        let listed = Cli::try_parse_from(["provador", "poses"]).unwrap();
        let Command::Poses(args) = listed.command else {
            panic!("expected poses");
        };
        assert!(args.name.is_none());

        let named = Cli::try_parse_from(["provador", "poses", "Perfil Pensativo"]).unwrap();
        let Command::Poses(args) = named.command else {
            panic!("expected poses");
        };
        assert_eq!(args.name.as_deref(), Some("Perfil Pensativo"));
    }

    #[test]
    fn default_out_dir_lives_under_runs() {
        let explicit = out_dir_or_default(Some(PathBuf::from("/tmp/x")));
        assert_eq!(explicit, PathBuf::from("/tmp/x"));
        let generated = out_dir_or_default(None);
        assert!(generated.starts_with("runs"));
    }

    #[test]
    fn json_object_drops_non_objects() {
        assert!(json_object(serde_json::json!([1, 2])).is_empty());
        assert_eq!(json_object(serde_json::json!({"a": 1})).len(), 1);
    }
}
