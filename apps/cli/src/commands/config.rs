//! 配置管理命令
//!
//! 用于管理 CLI 默认连接参数（串口、波特率、舵机 ID、读超时）

use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件路径：`<config_dir>/dynamixel/config.toml`
pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("dynamixel");
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置（所有字段可选，命令行参数优先）
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CliConfig {
    /// 默认串口
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// 默认波特率
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baud_rate: Option<u32>,

    /// 默认舵机 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u8>,

    /// 默认读超时（毫秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
}

impl CliConfig {
    /// 加载配置（文件不存在时返回默认配置）
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 保存配置
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, format!("# Dynamixel CLI Configuration\n\n{content}"))
            .context("写入配置文件失败")?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(match key {
            "port" => self.port.clone(),
            "baud_rate" | "baud" => self.baud_rate.map(|v| v.to_string()),
            "id" => self.id.map(|v| v.to_string()),
            "read_timeout_ms" | "timeout_ms" => self.read_timeout_ms.map(|v| v.to_string()),
            other => anyhow::bail!("未知配置项: {other}"),
        })
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 串口（如 /dev/ttyUSB0、COM3）
        #[arg(short, long)]
        port: Option<String>,

        /// 波特率
        #[arg(short, long)]
        baud: Option<u32>,

        /// 舵机 ID
        #[arg(short, long)]
        id: Option<u8>,

        /// 读超时（毫秒）
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称（port、baud_rate、id、read_timeout_ms 或 all）
        #[arg(default_value = "all")]
        key: String,
    },

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                port,
                baud,
                id,
                timeout_ms,
            } => Self::set_(path, port, baud, id, timeout_ms),
            ConfigCommand::Get { key } => Self::get_(path, &key),
            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }

    fn set_(
        path: &Path,
        port: Option<String>,
        baud: Option<u32>,
        id: Option<u8>,
        timeout_ms: Option<u64>,
    ) -> Result<()> {
        let mut config = CliConfig::load(path)?;

        if let Some(port) = port {
            println!("✅ 设置默认串口: {port}");
            config.port = Some(port);
        }
        if let Some(baud) = baud {
            println!("✅ 设置默认波特率: {baud}");
            config.baud_rate = Some(baud);
        }
        if let Some(id) = id {
            println!("✅ 设置默认舵机 ID: {id}");
            config.id = Some(id);
        }
        if let Some(timeout_ms) = timeout_ms {
            println!("✅ 设置默认读超时: {timeout_ms} ms");
            config.read_timeout_ms = Some(timeout_ms);
        }

        config.save(path)
    }

    fn get_(path: &Path, key: &str) -> Result<()> {
        let config = CliConfig::load(path)?;

        if key == "all" {
            println!("Dynamixel CLI 配置 ({}):", path.display());
            println!("  串口: {:?}", config.port);
            println!("  波特率: {:?}", config.baud_rate);
            println!("  舵机 ID: {:?}", config.id);
            println!("  读超时: {:?}", config.read_timeout_ms);
            return Ok(());
        }

        match config.get(key)? {
            Some(value) => println!("{value}"),
            None => println!("(未设置)"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert_eq!(CliConfig::load(&path).unwrap(), CliConfig::default());

        let config = CliConfig {
            port: Some("/dev/ttyUSB0".into()),
            baud_rate: Some(57_600),
            id: Some(3),
            read_timeout_ms: None,
        };
        config.save(&path).unwrap();
        assert_eq!(CliConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_get_unknown_key_fails() {
        let config = CliConfig::default();
        assert!(config.get("interface").is_err());
        assert_eq!(config.get("port").unwrap(), None);
    }

    #[test]
    fn test_invalid_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "id = \"not a number\"").unwrap();
        assert!(CliConfig::load(&path).is_err());
    }
}
