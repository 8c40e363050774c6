//! Command-line interface for the wsign WS-Security toolkit.
//!
//! Generates self-signed identities, renders UsernameToken security
//! headers, and signs or verifies SOAP envelopes using PKCS#12 key
//! stores.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wsign::{
    verify_envelope, BuiltinTemplates, CertificateAuthority, CertificateOptions, EnvelopeSigner,
    KeyStore, KeyStoreBuilder, UsernameTokenBuilder,
};

#[derive(Parser)]
#[command(name = "wsign")]
#[command(about = "WS-Security artifact toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a self-signed certificate and write it to a PKCS#12 store
    GenCert {
        /// Subject distinguished name, e.g. "CN=client,O=example"
        #[arg(short, long, default_value = "CN=wsign client")]
        subject: String,

        /// RSA key size in bits
        #[arg(long, default_value = "1024")]
        key_bits: usize,

        /// Output PKCS#12 file
        #[arg(short, long, default_value = "wsign.p12")]
        out: PathBuf,

        /// Store password
        #[arg(long)]
        password: String,

        /// Entry alias
        #[arg(long, default_value = "client")]
        alias: String,
    },

    /// Render a wsse:Security UsernameToken header
    Token {
        /// Username
        #[arg(short, long)]
        user: String,

        /// Password
        #[arg(long)]
        password: String,

        /// Emit a PasswordDigest token instead of PasswordText
        #[arg(long)]
        digest: bool,
    },

    /// Sign a SOAP envelope with a PKCS#12 identity
    Sign {
        /// Input envelope XML file
        input: PathBuf,

        /// PKCS#12 key store
        #[arg(short = 'p', long)]
        pkcs12: PathBuf,

        /// Store password
        #[arg(long)]
        password: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify the enveloped signature of a signed SOAP document
    Verify {
        /// Signed envelope XML file
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::GenCert {
            subject,
            key_bits,
            out,
            password,
            alias,
        } => {
            let mut options = CertificateOptions::new(subject);
            options.key_bits = key_bits;
            let identity = CertificateAuthority::new().issue(&options)?;
            KeyStoreBuilder::new()
                .alias(alias)
                .password(password)
                .identity(&identity)
                .build()?
                .save(&out)?;
            println!("Wrote {}", out.display());
        }
        Command::Token {
            user,
            password,
            digest,
        } => {
            let templates = BuiltinTemplates;
            let mut builder = UsernameTokenBuilder::new(&templates);
            let header = if digest {
                builder.digest_header(&user, &password)?
            } else {
                builder.plain_header(&user, &password)?
            };
            println!("{header}");
        }
        Command::Sign {
            input,
            pkcs12,
            password,
            output,
        } => {
            let entry = KeyStore::open_file(&pkcs12, &password)?;
            let signer =
                EnvelopeSigner::from_parts(entry.private_key()?, entry.certificate_der().to_vec())?;
            let envelope = std::fs::read_to_string(&input)?;
            let signed = signer.sign_envelope(&envelope)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, signed)?;
                    println!("Signed: {}", path.display());
                }
                None => println!("{signed}"),
            }
        }
        Command::Verify { input } => {
            let signed = std::fs::read_to_string(&input)?;
            if verify_envelope(&signed)? {
                println!("Signature valid");
            } else {
                println!("Signature INVALID");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
