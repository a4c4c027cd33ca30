//! note-vault - client-side encryption for notes and attachments.
//!
//! Encrypts note text into a hex payload, seals attachments into packed
//! blobs, and builds attachment previews from a directory-backed store.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use note_vault::crypto::{self, EncryptedTextPayload, PackedEncryptedFile};
use note_vault::{AttachmentCache, AttachmentIndexer, DirStore, Note, VaultConfig};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "note-vault")]
#[command(author, version, long_about = None)]
#[command(about = "Client-side encryption for notes and attachments")]
struct Cli {
    /// Read the password from this environment variable instead of prompting
    #[arg(long, global = true)]
    password_env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt note text and print the payload as JSON
    EncryptText {
        /// Text to encrypt (default: stdin)
        #[arg(long)]
        text: Option<String>,

        /// Reuse this 16-byte salt (hex) instead of a random one
        #[arg(long)]
        salt: Option<String>,
    },

    /// Decrypt note text
    DecryptText {
        /// JSON payload file with ciphertext, iv and salt
        #[arg(long, conflicts_with_all = ["ciphertext", "iv", "salt"])]
        payload: Option<PathBuf>,

        /// Hex ciphertext
        #[arg(long, requires_all = ["iv", "salt"])]
        ciphertext: Option<String>,

        /// Hex iv (12 bytes)
        #[arg(long)]
        iv: Option<String>,

        /// Hex salt (16 bytes)
        #[arg(long)]
        salt: Option<String>,
    },

    /// Encrypt a file into a packed blob
    EncryptFile {
        input: PathBuf,
        output: PathBuf,
    },

    /// Decrypt a packed blob
    DecryptFile {
        input: PathBuf,
        output: PathBuf,
    },

    /// Show the header fields of a packed blob
    Inspect {
        input: PathBuf,
    },

    /// Build attachment previews for a note from a directory store
    Index {
        /// Directory holding attachment objects
        store_dir: PathBuf,

        /// Note record (JSON)
        note: PathBuf,

        /// Vault configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("note_vault=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let env = cli.password_env.as_deref();
    match cli.command {
        Commands::EncryptText { text, salt } => cmd_encrypt_text(env, text, salt),

        Commands::DecryptText {
            payload,
            ciphertext,
            iv,
            salt,
        } => cmd_decrypt_text(env, payload, ciphertext, iv, salt),

        Commands::EncryptFile { input, output } => cmd_encrypt_file(env, &input, &output),

        Commands::DecryptFile { input, output } => cmd_decrypt_file(env, &input, &output),

        Commands::Inspect { input } => cmd_inspect(&input),

        Commands::Index {
            store_dir,
            note,
            config,
        } => cmd_index(env, &store_dir, &note, config.as_deref()).await,
    }
}

fn read_password(env: Option<&str>, prompt: &str) -> anyhow::Result<String> {
    let password = match env {
        Some(var) => std::env::var(var).with_context(|| format!("{} is not set", var))?,
        None => rpassword::prompt_password(prompt).context("failed to read password")?,
    };
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password)
}

fn cmd_encrypt_text(
    env: Option<&str>,
    text: Option<String>,
    salt: Option<String>,
) -> anyhow::Result<()> {
    let text = match text {
        Some(t) => t,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let password = read_password(env, "Password: ")?;

    let payload = match salt {
        Some(hex_salt) => {
            let salt: [u8; 16] = hex::decode(&hex_salt)?
                .try_into()
                .map_err(|_| anyhow!("salt must be 16 bytes"))?;
            crypto::encrypt_with_salt(&text, &password, salt)?
        }
        None => crypto::encrypt(&text, &password)?,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn cmd_decrypt_text(
    env: Option<&str>,
    payload: Option<PathBuf>,
    ciphertext: Option<String>,
    iv: Option<String>,
    salt: Option<String>,
) -> anyhow::Result<()> {
    let payload = match (payload, ciphertext, iv, salt) {
        (Some(path), _, _, _) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<EncryptedTextPayload>(&raw)?
        }
        (None, Some(ciphertext), Some(iv), Some(salt)) => EncryptedTextPayload {
            ciphertext,
            iv,
            salt,
        },
        _ => bail!("pass --payload or all of --ciphertext, --iv and --salt"),
    };
    let password = read_password(env, "Password: ")?;

    let text = crypto::decrypt_payload(&payload, &password)?;
    io::stdout().write_all(text.as_bytes())?;
    Ok(())
}

fn cmd_encrypt_file(env: Option<&str>, input: &Path, output: &Path) -> anyhow::Result<()> {
    let data = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let password = read_password(env, "Password: ")?;

    let packed = crypto::encrypt_file(&data, &password)?;
    std::fs::write(output, packed.as_bytes())?;
    println!("Wrote {} bytes to {}", packed.len(), output.display());
    Ok(())
}

fn cmd_decrypt_file(env: Option<&str>, input: &Path, output: &Path) -> anyhow::Result<()> {
    let packed = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let password = read_password(env, "Password: ")?;

    let decrypted = crypto::decrypt_file(&packed, &password, None)?;
    std::fs::write(output, &decrypted.bytes)?;
    println!("Wrote {} bytes to {}", decrypted.bytes.len(), output.display());
    Ok(())
}

fn cmd_inspect(input: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let packed = PackedEncryptedFile::from_bytes(bytes)
        .map_err(|_| anyhow!("{} is too short to be a packed file", input.display()))?;

    println!("Packed file:      {}", input.display());
    println!("Total size:       {} bytes", packed.len());
    println!("Salt:             {}", hex::encode(packed.salt()));
    println!("IV:               {}", hex::encode(packed.iv()));
    println!("Ciphertext + tag: {} bytes", packed.ciphertext().len());
    Ok(())
}

async fn cmd_index(
    env: Option<&str>,
    store_dir: &Path,
    note_path: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => VaultConfig::from_json_file(path)?,
        None => VaultConfig::default(),
    };
    let raw = std::fs::read_to_string(note_path)
        .with_context(|| format!("failed to read {}", note_path.display()))?;
    let note: Note = serde_json::from_str(&raw)?;
    note.validate()?;

    let password = if note.is_encrypted && note.has_attachments() {
        Some(read_password(env, "Password: ")?)
    } else {
        None
    };

    let cache = AttachmentCache::new();
    let indexer = AttachmentIndexer::new(Arc::new(DirStore::new(store_dir)), cache.clone())
        .with_concurrency(config.index_concurrency);
    let report = indexer.index(&note, password.as_deref()).await;

    println!("Attachment Index");
    println!("================");
    println!("Indexed:  {}", report.indexed);
    println!("Skipped:  {}", report.skipped);
    println!("Failed:   {}", report.failed);
    println!();
    for path in &note.attachments {
        if let Some(text) = cache.text(path) {
            let first_line = text.lines().next().unwrap_or("");
            println!("  text   {}  {}", path, first_line);
        } else if let Some(image) = cache.image(path) {
            println!("  image  {}  {} ({} chars)", path, image.mime, image.data_url.len());
        } else {
            println!("  -      {}", path);
        }
    }
    Ok(())
}
