// ==========================================
// 物料产出测算系统 - 控制台入口
// ==========================================
// 用法:
//   obraz-plus materials
//   obraz-plus types
//   obraz-plus material-type <id>
//   obraz-plus product-types
//   obraz-plus product <id>
//   obraz-plus material <id>
//   obraz-plus products <material_id>
//   obraz-plus estimate <material_id> [param1] [param2]
//   obraz-plus calc <product_type_id> <material_type_id> <raw_quantity> [param1] [param2]
//   obraz-plus save '<json>'        (含 "id" 时更新，否则新增)
//   obraz-plus config [key value]
// 输出: JSON（stdout）；日志走 stderr
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use obraz_plus::app::{get_default_db_path, AppState};
use obraz_plus::domain::MaterialFields;
use obraz_plus::engine::YieldRequest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct SaveInput {
    id: Option<i64>,
    #[serde(flatten)]
    fields: MaterialFields,
}

#[derive(Debug, Serialize)]
struct CalcOutput {
    result: i64,
    quantity: Option<u64>,
    error: Option<obraz_plus::YieldError>,
}

fn parse_arg<T>(value: Option<String>, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = value.ok_or_else(|| anyhow!("缺少参数 <{}>", name))?;
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("参数 <{}> 无效 ({:?}): {}", name, raw, e))
}

fn parse_optional<T>(value: Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => parse_arg(Some(v), name).map(Some),
        None => Ok(None),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    obraz_plus::logging::init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "materials".to_string());

    let db_path = get_default_db_path();
    tracing::info!("{} v{}，数据库: {}", obraz_plus::APP_NAME, obraz_plus::VERSION, db_path);
    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    match command.as_str() {
        "materials" => print_json(&state.material_api.list_materials()?),
        "types" => print_json(&state.material_api.list_material_types()?),
        "material-type" => {
            let id: i64 = parse_arg(args.next(), "id")?;
            print_json(&state.material_api.get_material_type(id)?)
        }
        "product-types" => print_json(&state.material_api.list_product_types()?),
        "product" => {
            let id: i64 = parse_arg(args.next(), "id")?;
            print_json(&state.material_api.get_product(id)?)
        }
        "material" => {
            let id: i64 = parse_arg(args.next(), "id")?;
            print_json(&state.material_api.get_material(id)?)
        }
        "products" => {
            let id: i64 = parse_arg(args.next(), "material_id")?;
            print_json(&state.material_api.list_products_for_material(id)?)
        }
        "estimate" => {
            let id: i64 = parse_arg(args.next(), "material_id")?;
            let param1 = parse_optional(args.next(), "param1")?;
            let param2 = parse_optional(args.next(), "param2")?;
            print_json(&state.yield_api.estimate_for_material(id, param1, param2)?)
        }
        "calc" => {
            let product_type_id: i64 = parse_arg(args.next(), "product_type_id")?;
            let material_type_id: i64 = parse_arg(args.next(), "material_type_id")?;
            let raw_quantity: f64 = parse_arg(args.next(), "raw_quantity")?;
            let param1: Option<f64> = parse_optional(args.next(), "param1")?;
            let param2: Option<f64> = parse_optional(args.next(), "param2")?;

            let defaults = state.config_manager.calc_defaults()?;
            let request = YieldRequest {
                product_type_id: Some(product_type_id),
                material_type_id: Some(material_type_id),
                raw_quantity,
                param1: param1.unwrap_or(defaults.param1),
                param2: param2.unwrap_or(defaults.param2),
            };

            let outcome = state.yield_api.compute(&request);
            print_json(&CalcOutput {
                result: state.yield_api.compute_sentinel(&request),
                quantity: outcome.as_ref().ok().copied(),
                error: outcome.err(),
            })
        }
        "save" => {
            let raw = args.next().ok_or_else(|| anyhow!("缺少参数 <json>"))?;
            let input: SaveInput =
                serde_json::from_str(&raw).context("物料 JSON 格式错误")?;
            let response = state.material_api.save_material(input.id, input.fields);
            print_json(&response)?;
            if !response.success {
                std::process::exit(1);
            }
            Ok(())
        }
        "config" => {
            if let (Some(key), Some(value)) = (args.next(), args.next()) {
                state.config_manager.set_value(&key, &value)?;
            }
            print_json(&state.config_manager.list_all()?)
        }
        other => bail!("未知命令: {}", other),
    }
}
