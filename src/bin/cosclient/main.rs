use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, trace};

use cosclient_rs::config::Config;
use cosclient_rs::config::args::Command;
use cosclient_rs::{
    BulkDeleteReport, CLIArgs, CosClient, CosError, create_deletion_cancellation_token,
    exit_code_from_error, is_cancelled_error,
};

mod ctrl_c_handler;
mod tracing_init;

/// cosclient - IBM Cloud Object Storage client.
///
/// This binary is a thin wrapper over the cosclient-rs library.
/// All core functionality is implemented in the library crate.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    let args = CLIArgs::parse();

    if let Some(shell) = args.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "cosclient",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    let (config, command) = load_config_exit_if_err(args);

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    if let Err(e) = run(config, command).await {
        if is_cancelled_error(&e) {
            debug!("bulk deletion cancelled by user.");
            return Ok(());
        }
        error!("{:#}", e);
        std::process::exit(exit_code_from_error(&e));
    }

    Ok(())
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err(args: CLIArgs) -> (Config, Command) {
    let command = args.command.clone();
    match (Config::try_from(args), command) {
        (Ok(config), Some(command)) => (config, command),
        (Err(error_message), _) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
        (Ok(_), None) => clap::Error::raw(
            clap::error::ErrorKind::MissingSubcommand,
            "A subcommand is required.",
        )
        .exit(),
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

async fn run(config: Config, command: Command) -> Result<()> {
    let start_time = tokio::time::Instant::now();
    let client = CosClient::new(config)?;

    match command {
        Command::ListBuckets => {
            for bucket in client.list_buckets().await?.buckets {
                println!(
                    "{}\t{}\t{}",
                    bucket.name, bucket.location_constraint, bucket.creation_date
                );
            }
        }
        Command::CreateBucket {
            bucket,
            deployment_type,
            region,
        } => {
            client
                .create_bucket(&bucket, &deployment_type, &region)
                .await?;
        }
        Command::DeleteBucket { bucket, all } => {
            if all {
                let report = empty_bucket(&client, &bucket).await?;
                print_report(&report);
            }
            client.delete_bucket(&bucket).await?;
        }
        Command::BucketExists { bucket } => {
            if !client.bucket_exists(&bucket).await {
                return Err(CosError::BucketNotFound(bucket).into());
            }
            println!("{bucket} exists");
        }
        Command::BucketLocation { bucket } => {
            println!("{}", client.get_bucket_location(&bucket).await?);
        }
        Command::BucketMetadata { bucket } => {
            let metadata = client.get_bucket_metadata(&bucket).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Command::Endpoint { bucket } => {
            println!("{}", client.endpoint_for_bucket(&bucket).await?);
        }
        Command::ListObjects { bucket } => {
            for object in client.list_objects(&bucket).await? {
                println!("{}\t{}\t{}", object.last_modified, object.size, object.key);
            }
        }
        Command::Upload { bucket, key, file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            client.upload_object(&bucket, &key, Bytes::from(data)).await?;
        }
        Command::Download {
            bucket,
            key,
            output,
        } => {
            let data = client.download_object(&bucket, &key).await?;
            write_output(output.as_deref(), &data).await?;
        }
        Command::DeleteObject { bucket, key } => {
            client.delete_object(&bucket, &key).await?;
        }
        Command::Copy {
            src_bucket,
            src_key,
            dst_bucket,
            dst_key,
        } => {
            client
                .copy_object(&src_bucket, &src_key, &dst_bucket, &dst_key)
                .await?;
        }
        Command::EmptyBucket { bucket } => {
            let report = empty_bucket(&client, &bucket).await?;
            print_report(&report);
        }
    }

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
    debug!(duration_sec = duration_sec, "cosclient has been completed.");
    Ok(())
}

async fn empty_bucket(client: &CosClient, bucket: &str) -> Result<BulkDeleteReport> {
    let cancellation_token = create_deletion_cancellation_token();
    let ctrl_c_handle = ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let result = client
        .delete_bucket_contents_with_cancellation(bucket, cancellation_token.clone())
        .await;

    // release the handler
    cancellation_token.cancel();
    let _ = ctrl_c_handle.await;

    let report = result?;
    info!(
        bucket = bucket,
        total_objects = report.total_objects,
        total_batches = report.total_batches,
        "bucket emptied."
    );
    Ok(report)
}

fn print_report(report: &BulkDeleteReport) {
    println!(
        "deleted {} objects in {} batches",
        report.deleted_objects, report.total_batches
    );
}

async fn write_output(output: Option<&Path>, data: &[u8]) -> Result<()> {
    match output {
        Some(path) => tokio::fs::write(path, data)
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(data).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
