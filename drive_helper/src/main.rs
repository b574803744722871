//! drive_helper CLI - Google Drive file helpers from the command line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::glob;
use tracing_subscriber::{fmt, EnvFilter};

use drive_helper::models::format_size;
use drive_helper::{
    Authenticator, ClientConfig, DriveClient, PermissionRole, PermissionType,
};

/// CLI tool for working with files on Google Drive.
#[derive(Parser)]
#[command(name = "drive_helper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to service account JSON credentials file.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// OAuth access token; takes precedence over --credentials.
    #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Override the Drive API base URL.
    #[arg(long, env = "DRIVE_API_BASE")]
    api_base: Option<String>,

    /// Override the Drive upload base URL.
    #[arg(long, env = "DRIVE_UPLOAD_BASE")]
    upload_base: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show account and quota information.
    About,

    /// List files, optionally filtered by a Drive search query.
    List {
        /// Search query, e.g. "title contains 'report'".
        #[arg(long, short = 'q')]
        query: Option<String>,
    },

    /// Upload files to a folder.
    Upload {
        /// File patterns to upload (supports glob patterns like *.tar, file_{1,2,3}.txt).
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Destination folder ID.
        #[arg(long, short = 't', default_value = "root")]
        to: String,
    },

    /// Replace the content and metadata of an existing file.
    Update {
        /// Local file with the new content.
        file: PathBuf,

        /// ID of the file to replace.
        #[arg(long)]
        id: String,

        /// Parent folder ID.
        #[arg(long, short = 't', default_value = "root")]
        to: String,
    },

    /// Download a file to local filesystem.
    Download {
        /// File ID to download.
        file: String,

        /// Local destination path (file or directory).
        #[arg(long, short = 't', default_value = ".")]
        to: PathBuf,
    },

    /// Create a folder.
    Mkdir {
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Parent folder ID.
        #[arg(long, default_value = "root")]
        parent: String,
    },

    /// Grant a permission on a file or folder.
    Share {
        /// File or folder ID.
        file: String,

        /// Email address or domain; leave empty for "anyone".
        #[arg(long, default_value = "")]
        value: String,

        #[arg(long = "type", value_enum, default_value_t = PrincipalArg::Anyone)]
        kind: PrincipalArg,

        #[arg(long, value_enum, default_value_t = RoleArg::Reader)]
        role: RoleArg,
    },

    /// Print the ID of an application folder, creating it if needed.
    AppFolder {
        name: String,
    },

    /// Check whether a file of the given size fits in the remaining quota.
    CanUpload {
        /// Size in bytes.
        size: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PrincipalArg {
    User,
    Group,
    Domain,
    Anyone,
}

impl From<PrincipalArg> for PermissionType {
    fn from(arg: PrincipalArg) -> Self {
        match arg {
            PrincipalArg::User => PermissionType::User,
            PrincipalArg::Group => PermissionType::Group,
            PrincipalArg::Domain => PermissionType::Domain,
            PrincipalArg::Anyone => PermissionType::Anyone,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Owner,
    Writer,
    Reader,
}

impl From<RoleArg> for PermissionRole {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Owner => PermissionRole::Owner,
            RoleArg::Writer => PermissionRole::Writer,
            RoleArg::Reader => PermissionRole::Reader,
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("drive_helper=info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let auth = match (&cli.token, &cli.credentials) {
        (Some(token), _) => Authenticator::from_token(token.clone()),
        (None, Some(path)) => Authenticator::from_file(path)
            .with_context(|| format!("Failed to load credentials from {:?}", path))?,
        (None, None) => {
            anyhow::bail!("Either --credentials or --token is required")
        }
    };

    let mut config = ClientConfig::default();
    if let Some(base) = cli.api_base {
        config = config.with_api_base(base);
    }
    if let Some(base) = cli.upload_base {
        config = config.with_upload_base(base);
    }

    let client = DriveClient::with_config(auth, config);

    match cli.command {
        Commands::About => {
            let about = client
                .about()
                .await
                .context("Failed to fetch account information")?;

            println!("User:        {}", about.name);
            println!("Root folder: {}", about.root_folder_id);
            println!("Total quota: {}", format_size(about.quota.total_bytes));
            println!("Used quota:  {}", format_size(about.quota.used_bytes));
            println!("Free quota:  {}", format_size(about.quota.free_bytes()));
        }

        Commands::List { query } => {
            let listing = client.list_files(query.as_deref()).await;

            if listing.files.is_empty() {
                println!("No files found.");
            } else {
                println!("{:<44} {:>10} {:<30} {}", "ID", "SIZE", "TYPE", "TITLE");
                println!("{}", "-".repeat(100));
                for file in &listing.files {
                    println!("{}", file);
                }
            }

            if let Some(err) = listing.interrupted {
                return Err(err).context("Listing incomplete");
            }
        }

        Commands::Upload { patterns, to } => {
            let mut files_to_upload: Vec<PathBuf> = Vec::new();

            for pattern in &patterns {
                // Handle brace expansion manually for patterns like file_{1,2,3}.txt
                for expanded_pattern in expand_braces(pattern) {
                    let matches: Vec<PathBuf> = glob(&expanded_pattern)
                        .with_context(|| format!("Invalid glob pattern: {}", expanded_pattern))?
                        .filter_map(|r| r.ok())
                        .filter(|p| p.is_file())
                        .collect();

                    if matches.is_empty() {
                        // If no glob matches, treat as literal path
                        let path = PathBuf::from(&expanded_pattern);
                        if path.is_file() {
                            files_to_upload.push(path);
                        } else {
                            eprintln!("Warning: No files matched pattern: {}", expanded_pattern);
                        }
                    } else {
                        files_to_upload.extend(matches);
                    }
                }
            }

            files_to_upload.sort();
            files_to_upload.dedup();

            if files_to_upload.is_empty() {
                anyhow::bail!("No files to upload");
            }

            println!("Uploading {} file(s) to {}...", files_to_upload.len(), to);

            let mut failed = 0;
            for (idx, file_path) in files_to_upload.iter().enumerate() {
                let filename = file_path.file_name().unwrap_or_default().to_string_lossy();
                print!("[{}/{}] Uploading {}... ", idx + 1, files_to_upload.len(), filename);

                match client.upload_file(file_path, &to).await {
                    Ok(file) => println!("OK ({})", file.id),
                    Err(e) => {
                        println!("FAILED");
                        eprintln!("  Error: {}", e);
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{} of {} upload(s) failed", failed, files_to_upload.len());
            }
        }

        Commands::Update { file, id, to } => {
            let updated = client
                .update_file(&file, &to, &id)
                .await
                .with_context(|| format!("Failed to update {} from {:?}", id, file))?;
            println!("Updated {}", updated);
        }

        Commands::Download { file, to } => {
            let resource = client
                .get_file(&file)
                .await
                .with_context(|| format!("Failed to fetch metadata for: {}", file))?;

            let final_path = if to.is_dir() {
                to.join(&resource.title)
            } else {
                if let Some(parent) = to.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
                    }
                }
                to
            };

            print!("Downloading {}... ", file);

            client
                .download_file(&resource, &final_path)
                .await
                .with_context(|| format!("Failed to download file: {}", file))?;

            println!("OK");
            println!("Saved to: {:?}", final_path);
        }

        Commands::Mkdir {
            title,
            description,
            parent,
        } => {
            let folder = client
                .create_directory(&title, &description, &parent)
                .await
                .with_context(|| format!("Failed to create folder: {}", title))?;
            println!("{}", folder.id);
        }

        Commands::Share {
            file,
            value,
            kind,
            role,
        } => {
            client
                .share(&file, &value, kind.into(), role.into())
                .await
                .with_context(|| format!("Failed to share: {}", file))?;
            println!("OK");
        }

        Commands::AppFolder { name } => {
            let folder_id = client
                .app_folder_id(&name)
                .await
                .with_context(|| format!("Failed to resolve application folder: {}", name))?;
            println!("{}", folder_id);
        }

        Commands::CanUpload { size } => {
            let fits = client
                .can_upload(size)
                .await
                .context("Failed to check quota")?;
            println!("{}", if fits { "yes" } else { "no" });
            if !fits {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Expand brace patterns like file_{1,2,3}.txt into multiple patterns.
fn expand_braces(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let alternatives = &pattern[start + 1..end];

            return alternatives
                .split(',')
                .flat_map(|alt| {
                    let expanded = format!("{}{}{}", prefix, alt.trim(), suffix);
                    expand_braces(&expanded)
                })
                .collect();
        }
    }

    vec![pattern.to_string()]
}
