use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use jobinput::assemble::helper::Assembler;
use jobinput::assemble::materialize::Materializer;
use jobinput::batch::generator::FilenameBatchGenerator;
use jobinput::batch::submit::{BatchSubmitter, JobInputApi};
use jobinput::collab::{HttpFetcher, NoExternalService, ServerFilePermissions};
use jobinput::config::ServerConfig;
use jobinput::db::open::open_db;
use jobinput::db::upload::SqliteUploadCatalog;
use jobinput::dispatch::lsf::LsfDispatcher;
use jobinput::module::JsonModuleRepository;
use jobinput::param::value::JobContext;
use jobinput::policy::PolicyProfile;
use jobinput::request::message::Message;
use jobinput::request::schema::load_schema;
use jobinput::resolve::resolver::ValueResolver;

#[derive(Parser, Debug)]
#[command(name = "jobinput")]
#[command(about = "Resolve the inputs of a job request and submit its jobs to LSF", long_about = None)]
struct Args {
    /// Server configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Directory of module manifests
    #[arg(short, long)]
    modules: PathBuf,

    /// Job request to submit (JSON)
    #[arg(short, long)]
    request: PathBuf,

    /// Submitting user
    #[arg(short, long)]
    user: String,

    /// Submit with admin rights (read any server file)
    #[arg(long, default_value_t = false)]
    admin: bool,

    /// SQLite database with the upload catalog and job table
    #[arg(long)]
    db: PathBuf,

    /// Overrides the list policy of the server configuration
    #[arg(long, value_enum)]
    policy: Option<PolicyProfile>,

    /// Pair the inputs of several batch parameters by file name instead of position
    #[arg(long, default_value_t = false)]
    pair_by_name: bool,

    /// Write the job directories but don't call bsub
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    info!("Starting up with {:?}", args);

    let mut config = ServerConfig::load(&args.config)?;
    if let Some(profile) = args.policy {
        config.list_policy = profile;
    }
    let policy = config.list_policy.policy();
    info!("List policy {}", config.list_policy);

    let modules = JsonModuleRepository::load(&args.modules)?;
    let request = Message { path: args.request.clone(), compiled_schema: load_schema()? }.read()?;
    let input = request.into_input_set();

    let conn = Arc::new(Mutex::new(
        open_db(&args.db).with_context(|| format!("Can't open database {}", args.db.display()))?,
    ));
    let catalog = Arc::new(SqliteUploadCatalog::new(conn.clone()));
    let materializer = Materializer::new(
        Arc::new(HttpFetcher::new()),
        Arc::new(NoExternalService),
        catalog.clone(),
        config.download_parallelism,
    );
    let assembler = Assembler::new(
        ValueResolver::new(&config, &policy, None),
        Arc::new(ServerFilePermissions::from_config(&config)),
        catalog,
        materializer,
        policy,
    )
    .strict_choice_values(config.strict_choice_values);
    let dispatcher = LsfDispatcher::new(conn, &config).dry_run(args.dry_run);
    let api = JobInputApi::new(Arc::new(modules), assembler, Arc::new(dispatcher));

    let mut submitter = BatchSubmitter::new(api);
    if args.pair_by_name {
        submitter = submitter.with_generator(Box::new(FilenameBatchGenerator));
    }

    let ctx = JobContext::new(&args.user, args.admin, input.lsid.clone());
    let receipt = submitter.submit(&ctx, &input).await?;
    print!("{receipt}");
    if !receipt.is_success() {
        bail!("{} jobs failed", receipt.failures().count());
    }
    Ok(())
}
