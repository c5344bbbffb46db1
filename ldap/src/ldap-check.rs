use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use log::info;

use ldapcheck_lib::config::{self, Config, LdapConfig};
use ldapcheck_lib::policy::AccessDecision;

use ldapcheck_ldap::api::{LdapSession, SessionGuard};
use ldapcheck_ldap::check::{self, CheckReport};
use ldapcheck_ldap::errors::Error;

// A test utility to connect to LDAP to verify the configuration
#[derive(Parser, Debug)]
#[command(name = "ldap-check", version)]
struct Args {
    /// Config file (YAML or TOML). Defaults to config.yml next to the executable
    #[arg(long, env = "LDAP_CHECK_CONFIG")]
    config_file: Option<PathBuf>,

    #[arg(long, env = "LDAP_HOST")]
    host: Option<String>,
    #[arg(long, env = "LDAP_PORT")]
    port: Option<u16>,
    /// Upgrade the connection with StartTLS
    #[arg(long)]
    use_ssl: bool,
    /// Verify the server certificate during StartTLS
    #[arg(long)]
    verify_tls: bool,
    /// Bind as the checked user instead of the bind user
    #[arg(long)]
    self_auth: bool,
    #[arg(long, env = "LDAP_BIND_USER")]
    bind_user: Option<String>,
    #[arg(long, env = "LDAP_BIND_PASS", hide_env_values = true)]
    bind_pass: Option<String>,
    /// Default base DN for user and group searches
    #[arg(long)]
    base: Option<String>,
    /// Connect timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long, env = "LDAP_CHECK_USERNAME")]
    username: Option<String>,
    #[arg(long, env = "LDAP_CHECK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

fn main() {
    setup_logging();

    if let Err(ref e) = run() {
        let stderr = &mut io::stderr();
        let errmsg = "Error writing to stderr";

        match e.downcast_ref::<Error>() {
            Some(check_err) => {
                writeln!(stderr, "error ({}): {}", check_err.stage(), e).expect(errmsg)
            }
            None => writeln!(stderr, "error: {}", e).expect(errmsg),
        }
        for cause in e.chain().skip(1) {
            writeln!(stderr, "caused by: {}", cause).expect(errmsg);
        }

        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.yes
        && read_input(
            "This test application will read and output all LDAP data from your config file. \
             This may include sensitive values. Do you wish to continue? [y/N] ",
        )? != "y"
    {
        println!("Exiting test application due to user response.");
        return Ok(());
    }

    let ldap = load_config(&args)?.ldap;
    if !ldap.use_ldap {
        println!("use_ldap is set to false, cannot continue test");
        return Ok(());
    }
    ldap.validate()
        .map_err(|e| Error::ConfigLoad(e.to_string()))?;

    info!("Loaded config: {:?}", ldap.redacted());
    if ldap.port == 0 {
        info!(
            "LDAP port not set in config, will use {} as the port",
            config::DEFAULT_LDAP_PORT
        );
    }

    let mut session = SessionGuard::new(LdapSession::connect(&ldap)?);
    println!("✓ Connected to LDAP server at {}", ldap.address());

    let (username, password) = read_credentials(&args)?;

    let report = check::run(&mut *session, &ldap, &username, &password)?;
    print_report(&report);

    session.close();

    match report.access {
        AccessDecision::Allowed => {
            println!("✓ Finished.");
            Ok(())
        }
        AccessDecision::Denied(reason) => Err(anyhow!("Access denied: {}", reason)),
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let explicit = args.config_file.is_some();
    let path = args.config_file.clone().unwrap_or_else(config::default_path);

    let mut config = if explicit || path.exists() || args.host.is_none() {
        info!("Loading config from {}", path.display());
        config::new(path).map_err(|e| Error::ConfigLoad(e.to_string()))?
    } else {
        info!("No config file found, using command line settings");
        Config {
            ldap: LdapConfig {
                use_ldap: true,
                ..LdapConfig::default()
            },
        }
    };

    apply_overrides(&mut config.ldap, args);
    Ok(config)
}

fn apply_overrides(ldap: &mut LdapConfig, args: &Args) {
    if let Some(ref host) = args.host {
        ldap.host = host.clone();
    }
    if let Some(port) = args.port {
        ldap.port = port;
    }
    if let Some(ref bind_user) = args.bind_user {
        ldap.bind_user = bind_user.clone();
    }
    if let Some(ref bind_pass) = args.bind_pass {
        ldap.bind_pass = bind_pass.clone();
    }
    if let Some(ref base) = args.base {
        ldap.base = base.clone();
    }
    if args.timeout.is_some() {
        ldap.timeout_secs = args.timeout;
    }
    ldap.use_ssl |= args.use_ssl;
    ldap.verify_tls |= args.verify_tls;
    ldap.self_auth |= args.self_auth;
}

fn read_credentials(args: &Args) -> anyhow::Result<(String, String)> {
    let username = match args.username {
        Some(ref u) if !u.is_empty() => u.clone(),
        _ => loop {
            let u = read_input("Please enter the username you'd like to log into the LDAP server with: ")?;
            if !u.is_empty() {
                break u;
            }
            println!("Invalid input, please try again.");
        },
    };

    let password = match args.password {
        Some(ref p) => p.clone(),
        None => rpassword::prompt_password("Please enter the password: ")?,
    };

    Ok((username, password))
}

fn print_report(report: &CheckReport) {
    println!("Got user details:");
    println!("\tDN: {}", report.user.dn());
    println!("\tUsername: {}", report.username);
    println!("\tCN: {}", report.cn);
    println!("\tMail: {}", report.mail);
    println!("\tDisplay name: {}", report.display_name);
    if let Some(ref name) = report.name_override {
        println!("\tDisplay name (name_attr override): {}", name);
    }

    println!("✓ Got group names: [{}]", report.groups.join(", "));
    println!("Matched group names: [{}]", report.matched_groups.join(", "));

    if !report.roles.is_empty() {
        println!("Granted roles:");
        for role in &report.roles {
            println!("\t{} (via {})", role.role, role.groups.join(", "));
        }
    }

    match report.access {
        AccessDecision::Allowed => println!("✓ Access policy allows user"),
        AccessDecision::Denied(ref reason) => println!("✗ Access policy denies user: {}", reason),
    }
}

fn read_input(prompt: &str) -> io::Result<String> {
    print!("{}", prompt);
    io::stdout().flush().unwrap_or(());

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn setup_logging() {
    let formatter = |buf: &mut env_logger::fmt::Formatter, record: &log::Record| {
        let now = chrono::Local::now();
        writeln!(
            buf,
            "[{},{:03}] - {} - {}",
            now.format("%Y-%m-%d %H:%M:%S"),
            now.timestamp_subsec_millis(),
            record.level(),
            record.args()
        )
    };

    let mut builder = env_logger::Builder::new();
    builder
        .format(formatter)
        .filter(None, log::LevelFilter::Info);

    let is_info;
    if let Ok(ref env_log) = std::env::var("RUST_LOG") {
        is_info = env_log.is_empty() || env_log.to_lowercase() == "info";
        builder.parse_filters(env_log);
    } else {
        is_info = true;
    }

    if is_info {
        builder.filter(Some("rustls"), log::LevelFilter::Warn);
    }

    builder.init();
}
