//! gsearch - GNOME Shell 搜索提供者命令行客户端
//!
//! 入口：初始化日志、加载配置、发现并连接提供者，执行子命令。

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use gnome_search_client::{
    config::load_config, observability, shutdown::ShutdownSignal, SearchClient,
};

#[derive(Parser, Debug)]
#[command(name = "gsearch", version, about = "Query GNOME Shell search providers over D-Bus")]
struct Cli {
    /// 额外的配置文件
    #[arg(short, long, env = "GSEARCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出发现的搜索提供者
    Providers,
    /// 搜索全部提供者，可附加若干细化轮
    Search {
        /// 搜索词
        #[arg(required = true)]
        terms: Vec<String>,
        /// 细化轮的搜索词（空格分隔），可重复
        #[arg(long = "refine")]
        refine: Vec<String>,
        /// 单轮截止时间（秒），覆盖配置
        #[arg(long)]
        timeout: Option<u64>,
        /// 为成功的结果获取元数据
        #[arg(long)]
        metas: bool,
    },
    /// 在提供者应用中打开一个结果
    Activate {
        desktop_id: String,
        result_id: String,
        terms: Vec<String>,
        #[arg(long, default_value_t = 0)]
        timestamp: u32,
    },
    /// 请求提供者应用展示更多结果
    Launch {
        desktop_id: String,
        terms: Vec<String>,
        #[arg(long, default_value_t = 0)]
        timestamp: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = Cli::parse();
    let config = load_config(cli.config).context("Failed to load config")?;
    let mut client = SearchClient::connect(&config)
        .await
        .context("Failed to connect to search providers")?;

    match cli.command {
        Command::Providers => {
            for endpoint in client.providers() {
                println!("{}", endpoint.identity());
            }
        }
        Command::Search {
            terms,
            refine,
            timeout,
            metas,
        } => {
            let shutdown = ShutdownSignal::new();
            shutdown.install_signal_handlers();
            client = client.with_cancellation(shutdown.token());
            if let Some(secs) = timeout {
                client
                    .session_mut()
                    .set_deadline(std::time::Duration::from_secs(secs));
            }

            run_round(&mut client, &terms, false, metas).await?;
            for next in refine {
                if shutdown.is_triggered() {
                    break;
                }
                let terms: Vec<String> = next.split_whitespace().map(str::to_string).collect();
                run_round(&mut client, &terms, true, metas).await?;
            }
        }
        Command::Activate {
            desktop_id,
            result_id,
            terms,
            timestamp,
        } => {
            client
                .activate(&desktop_id, &result_id, &terms, timestamp)
                .await
                .context("Activation failed")?;
        }
        Command::Launch {
            desktop_id,
            terms,
            timestamp,
        } => {
            client
                .launch(&desktop_id, &terms, timestamp)
                .await
                .context("Launch failed")?;
        }
    }

    Ok(())
}

/// 执行一轮并按到达顺序打印；结束后列出未完成的提供者
async fn run_round(
    client: &mut SearchClient,
    terms: &[String],
    refine: bool,
    metas: bool,
) -> anyhow::Result<()> {
    println!("== {}", terms.join(" "));

    let mut successes = Vec::new();
    {
        let mut round = if refine {
            client.refine(terms)
        } else {
            client.initial(terms)
        };
        while let Some(response) = round.next().await {
            println!("{response}");
            if let Some(err) = response.outcome.error() {
                println!("    {err}");
            } else if let Some(ids) = response.ids().filter(|ids| !ids.is_empty()) {
                println!("    {}", ids.join(", "));
                successes.push((response.endpoint.desktop_id().to_string(), ids.to_vec()));
            }
        }
    }

    let mut unfinished: Vec<_> = client
        .session()
        .unfinished()
        .iter()
        .map(|e| e.desktop_id().to_string())
        .collect();
    unfinished.sort();
    for desktop_id in unfinished {
        println!("{desktop_id}: no answer before deadline");
    }

    if metas {
        for (desktop_id, ids) in successes {
            match client.result_metas(&desktop_id, &ids).await {
                Ok(metas) => {
                    for meta in metas {
                        println!(
                            "    [{}] {} {}",
                            meta.id().unwrap_or("?"),
                            meta.name().unwrap_or(""),
                            meta.description().unwrap_or("")
                        );
                    }
                }
                Err(err) => tracing::warn!(provider = %desktop_id, error = %err, "Cannot fetch result metas"),
            }
        }
    }

    Ok(())
}
