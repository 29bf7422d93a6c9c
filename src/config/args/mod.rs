use std::ffi::OsString;
use std::path::PathBuf;

use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};

use crate::config::{
    Config, DEFAULT_BATCH_SIZE, DEFAULT_ENDPOINTS_URL, DEFAULT_GLOBAL_SERVICE_URL,
    DEFAULT_IAM_ENDPOINT, DEFAULT_MAX_KEYS, DEFAULT_REFRESH_LOOKAHEAD_SECONDS,
    DEFAULT_WORKER_SIZE, HttpConfig, MAX_BATCH_SIZE, MAX_REFRESH_LOOKAHEAD_SECONDS,
    TracingConfig,
};
use crate::types::ApiKey;

pub mod value_parser;

use value_parser::file_exist::is_file_exist;
use value_parser::url::check_service_url;


// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_ACCEPT_INVALID_CERTS: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_MISSING_API_KEY: &str =
    "An API key is required (--api-key or COS_API_KEY).";
const ERROR_MESSAGE_MISSING_INSTANCE_ID: &str =
    "A service instance id is required (--instance-id or COS_INSTANCE_ID).";
const ERROR_MESSAGE_MISSING_COMMAND: &str = "A subcommand is required.";
const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_BATCH_SIZE_ZERO: &str = "Batch size must be at least 1.";
const ERROR_MESSAGE_BATCH_SIZE_TOO_LARGE: &str =
    "Batch size must be at most 1000 (multi-object delete limit).";
const ERROR_MESSAGE_MAX_KEYS_ZERO: &str = "Max keys must be at least 1.";
const ERROR_MESSAGE_REFRESH_LOOKAHEAD_TOO_LARGE: &str =
    "Refresh lookahead must be at most 1800 seconds (IAM tokens live about an hour).";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// cosclient - IBM Cloud Object Storage client.
///
/// Manage buckets and objects in IBM Cloud Object Storage. Bucket
/// endpoints are resolved automatically from the bucket's location.
///
/// Example:
///   cosclient list-buckets
///   cosclient upload my-bucket reports/2024.csv ./2024.csv
///   cosclient empty-bucket my-bucket -v
#[derive(Parser, Clone, Debug)]
#[command(name = "cosclient", version, about, long_about = None)]
pub struct CLIArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------
    /// IBM Cloud API key exchanged for IAM bearer tokens.
    #[arg(long, env = "COS_API_KEY", hide_env_values = true, global = true,
        value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub api_key: Option<String>,

    /// COS service instance id (or CRN).
    #[arg(long, env = "COS_INSTANCE_ID", global = true,
        value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub instance_id: Option<String>,

    // -----------------------------------------------------------------------
    // Service endpoints
    // -----------------------------------------------------------------------
    /// IAM token endpoint.
    #[arg(long, env = "COS_IAM_ENDPOINT", global = true, default_value = DEFAULT_IAM_ENDPOINT,
        value_parser = check_service_url, help_heading = "Endpoints")]
    pub iam_endpoint: String,

    /// Endpoint topology discovery URL.
    #[arg(long, env = "COS_ENDPOINTS_URL", global = true, default_value = DEFAULT_ENDPOINTS_URL,
        value_parser = check_service_url, help_heading = "Endpoints")]
    pub endpoints_url: String,

    /// Region-agnostic service URL used for bucket listing and existence checks.
    #[arg(long, env = "COS_GLOBAL_SERVICE_URL", global = true, default_value = DEFAULT_GLOBAL_SERVICE_URL,
        value_parser = check_service_url, help_heading = "Endpoints")]
    pub global_service_url: String,

    /// Refresh the IAM token when it expires within this many seconds (at most 1800).
    #[arg(long, env, global = true, default_value_t = DEFAULT_REFRESH_LOOKAHEAD_SECONDS, help_heading = "Endpoints")]
    pub refresh_lookahead_seconds: u64,

    // -----------------------------------------------------------------------
    // Deletion options
    // -----------------------------------------------------------------------
    /// Number of multi-object delete requests in flight at once.
    #[arg(long, env, global = true, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Deletion")]
    pub worker_size: u16,

    /// Number of objects per multi-object delete request (1-1000).
    #[arg(long, env, global = true, default_value_t = DEFAULT_BATCH_SIZE, help_heading = "Deletion")]
    pub batch_size: u16,

    /// Listing page size.
    #[arg(long, env, global = true, default_value_t = DEFAULT_MAX_KEYS, help_heading = "Deletion")]
    pub max_keys: i32,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    #[arg(long, env, global = true, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    #[arg(long, env, global = true, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    #[arg(long, env, global = true, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // HTTP options
    // -----------------------------------------------------------------------
    #[arg(long, env, global = true, help_heading = "HTTP")]
    pub connect_timeout_milliseconds: Option<u64>,

    #[arg(long, env, global = true, help_heading = "HTTP")]
    pub request_timeout_milliseconds: Option<u64>,

    /// Skip TLS certificate verification.
    #[arg(long, env, global = true, default_value_t = DEFAULT_ACCEPT_INVALID_CERTS, help_heading = "Dangerous")]
    pub accept_invalid_certs: bool,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

/// Operations exposed by the CLI.
#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Command {
    /// List the buckets of the service instance with their locations.
    ListBuckets,

    /// Create a bucket.
    CreateBucket {
        bucket: String,
        /// Deployment type: cross-region, regional or single-site.
        #[arg(long = "type", value_name = "TYPE")]
        deployment_type: String,
        /// Region code within the deployment type, e.g. us-south.
        #[arg(long)]
        region: String,
    },

    /// Delete a bucket.
    DeleteBucket {
        bucket: String,
        /// Delete every object first.
        #[arg(long)]
        all: bool,
    },

    /// Exit 0 if the bucket exists, 1 otherwise.
    BucketExists { bucket: String },

    /// Print the bucket's location response.
    BucketLocation { bucket: String },

    /// Print the bucket's metadata as JSON.
    BucketMetadata { bucket: String },

    /// Print the regional endpoint serving a bucket.
    Endpoint { bucket: String },

    /// List every object in a bucket.
    ListObjects { bucket: String },

    /// Upload a local file as an object.
    Upload {
        bucket: String,
        key: String,
        #[arg(value_parser = is_file_exist)]
        file: PathBuf,
    },

    /// Download an object to a file or stdout.
    Download {
        bucket: String,
        key: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete one object.
    DeleteObject { bucket: String, key: String },

    /// Copy an object server-side.
    Copy {
        src_bucket: String,
        src_key: String,
        dst_bucket: String,
        dst_key: String,
    },

    /// Delete every object in a bucket, keeping the bucket.
    EmptyBucket { bucket: String },
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.command.is_none() {
            return Err(ERROR_MESSAGE_MISSING_COMMAND.to_string());
        }
        if self.api_key.is_none() {
            return Err(ERROR_MESSAGE_MISSING_API_KEY.to_string());
        }
        if self.instance_id.is_none() {
            return Err(ERROR_MESSAGE_MISSING_INSTANCE_ID.to_string());
        }
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if self.batch_size == 0 {
            return Err(ERROR_MESSAGE_BATCH_SIZE_ZERO.to_string());
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(ERROR_MESSAGE_BATCH_SIZE_TOO_LARGE.to_string());
        }
        if self.max_keys <= 0 {
            return Err(ERROR_MESSAGE_MAX_KEYS_ZERO.to_string());
        }
        if self.refresh_lookahead_seconds > MAX_REFRESH_LOOKAHEAD_SECONDS {
            return Err(ERROR_MESSAGE_REFRESH_LOOKAHEAD_TOO_LARGE.to_string());
        }
        Ok(())
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }

    fn build_http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout_milliseconds: self.connect_timeout_milliseconds,
            request_timeout_milliseconds: self.request_timeout_milliseconds,
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        let config = Config {
            api_key: ApiKey::new(args.api_key.clone().unwrap_or_default()),
            service_instance_id: args.instance_id.clone().unwrap_or_default(),
            iam_endpoint: args.iam_endpoint.clone(),
            endpoints_url: args.endpoints_url.clone(),
            global_service_url: args.global_service_url.clone(),
            refresh_lookahead_seconds: args.refresh_lookahead_seconds,
            worker_size: args.worker_size,
            batch_size: args.batch_size,
            max_keys: args.max_keys,
            http_config: args.build_http_config(),
            tracing_config: args.build_tracing_config(),
        };
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}
