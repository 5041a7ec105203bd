//! Runner Vitals 主程序入口

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    runner_vitals::app::main().await
}
