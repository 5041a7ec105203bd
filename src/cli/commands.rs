//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::app::components::Components;
use crate::app::service::ServiceLauncher;
use crate::cli::args::{Args, CheckTarget, Commands, OutputFormat};
use crate::config::Config;
use crate::health::{CycleDetails, CycleResult, PolicyEvaluator, Reporter, Threshold};
use anyhow::Result;
use async_trait::async_trait;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    ///
    /// # 参数
    /// * `args` - 命令行参数
    /// * `config` - 已加载并叠加环境变量的配置
    async fn execute(&self, args: &Args, config: &Config) -> Result<()>;
}

/// 服务命令
pub struct ServeCommand;

#[async_trait]
impl Command for ServeCommand {
    async fn execute(&self, args: &Args, config: &Config) -> Result<()> {
        if let Commands::Serve {
            interval,
            bind,
            port,
            no_web,
        } = &args.command
        {
            let mut config = config.clone();
            ServiceLauncher::apply_overrides(&mut config, *interval, bind.as_deref(), *port, *no_web)?;
            ServiceLauncher::run(config).await
        } else {
            Ok(())
        }
    }
}

/// 检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args, config: &Config) -> Result<()> {
        if let Commands::Check {
            target,
            threshold,
            format,
        } = &args.command
        {
            let result = self
                .run_once(config, *target, threshold.as_deref())
                .await?;
            self.print_result(&result, *format)?;

            if !result.success {
                anyhow::bail!("检测失败: {}", result.message);
            }
        }
        Ok(())
    }
}

impl CheckCommand {
    /// 执行一次检测周期
    async fn run_once(
        &self,
        config: &Config,
        target: CheckTarget,
        threshold: Option<&str>,
    ) -> Result<CycleResult> {
        let components = Components::from_config(config)?;
        let (check, threshold) = match target {
            CheckTarget::Runners => (components.runners, components.threshold),
            CheckTarget::Vnet => (
                components.vnet,
                Threshold::parse_or(threshold, components.threshold)?,
            ),
        };

        let evaluator = PolicyEvaluator::new(threshold);
        Ok(Reporter::run_cycle(check.as_ref(), &evaluator, components.sink.as_ref()).await)
    }

    fn print_result(&self, result: &CycleResult, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            OutputFormat::Text => {
                let status_icon = if result.success { "✓" } else { "✗" };
                println!("{} {}", status_icon, result.message);
                match &result.details {
                    Some(CycleDetails::Runners(summary)) => {
                        println!("  Runner 总数: {}", summary.total_runners);
                        for name in &summary.offline_runners {
                            println!("  离线: {name}");
                        }
                    }
                    Some(CycleDetails::Usage(summary)) => {
                        println!(
                            "  用量条目: {}，阈值: {}%",
                            summary.total_usages, summary.threshold_percentage
                        );
                        for usage in &summary.threshold_exceeded {
                            println!(
                                "  超限: {} {}/{} ({:.2}%)",
                                usage.name, usage.current_value, usage.limit, usage.usage_pct
                            );
                        }
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args, config: &Config) -> Result<()> {
        let verbose = matches!(args.command, Commands::Validate { verbose: true });
        println!("✓ 配置验证通过");

        report_missing("Runner 检测", config.runners.enabled, &config.runners.missing_settings());
        report_missing("VNet 检测", config.vnet.enabled, &config.vnet.missing_settings());

        if config.sink.is_configured() {
            println!("✓ 日志摄取端点已配置");
        } else {
            println!("! 日志摄取端点未配置，记录只输出到日志");
        }

        if verbose {
            println!("全局配置:");
            println!("  检测间隔: {}秒", config.global.check_interval_seconds);
            println!("  启动时检测: {}", if config.global.run_on_startup { "是" } else { "否" });
            println!("  日志级别: {}", config.global.log_level);
            println!("  请求超时: {}秒", config.global.request_timeout_seconds);
            println!("  默认阈值: {}%", config.global.threshold_percentage);
            println!("日志流:");
            println!("  Runner: {}", config.sink.runner_stream);
            println!("  VNet: {}", config.sink.vnet_stream);
            if config.web.enabled {
                println!("HTTP端点: {}:{}", config.web.bind_address, config.web.port);
            }
        }
        Ok(())
    }
}

fn report_missing(name: &str, enabled: bool, missing: &[&str]) {
    if !enabled {
        println!("- {name}已禁用");
    } else if missing.is_empty() {
        println!("✓ {name}配置完整");
    } else {
        println!("✗ {name}缺少配置: {}", missing.join(", "));
    }
}
