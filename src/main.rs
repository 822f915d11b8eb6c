use anyhow::Result;
use question_forge::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logger::init_with_level(&config.log_level);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
