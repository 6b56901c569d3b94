//! 结构化文档配置值
//!
//! 用户自定义类型以JSON形式存储，重载时按注册时的类型重新反序列化

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type DecodeFn = fn(&str) -> Result<Document, serde_json::Error>;

/// 类型擦除后的结构化文档
///
/// 内部保存用户类型实例、其规范化JSON，以及按注册类型单态化的解码函数。
/// 解码总是产生同一类型的新实例，因此重载不会改变配置项的声明类型。
#[derive(Clone)]
pub struct Document {
    inner: Arc<dyn Any + Send + Sync>,
    json: JsonValue,
    type_name: &'static str,
    decode: DecodeFn,
}

impl Document {
    /// 从用户类型构造文档
    ///
    /// # 参数
    /// * `value` - 用户类型实例
    ///
    /// # 返回
    /// * `Result<Self, serde_json::Error>` - 无法序列化为JSON时返回错误
    pub fn new<T>(value: T) -> Result<Self, serde_json::Error>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let json = serde_json::to_value(&value)?;
        Ok(Self {
            inner: Arc::new(value),
            json,
            type_name: std::any::type_name::<T>(),
            decode: decode_as::<T>,
        })
    }

    /// 将原始JSON文本解码为同类型的新文档
    pub fn decode(&self, raw: &str) -> Result<Document, serde_json::Error> {
        (self.decode)(raw)
    }

    /// 获取具体类型的共享引用
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// 规范化后的JSON
    pub fn json(&self) -> &JsonValue {
        &self.json
    }

    /// 注册时的Rust类型名
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

fn decode_as<T>(raw: &str) -> Result<Document, serde_json::Error>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let value: T = serde_json::from_str(raw)?;
    Document::new(value)
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("type_name", &self.type_name)
            .field("json", &self.json)
            .finish()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.json == other.json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Limits {
        max_age: i32,
        min_age: i32,
    }

    #[test]
    fn test_decode_keeps_registered_type() {
        let doc = Document::new(Limits::default()).unwrap();
        let fresh = doc.decode(r#"{"max_age": 60, "min_age": 18}"#).unwrap();

        assert_eq!(fresh.type_name(), doc.type_name());
        let limits = fresh.downcast::<Limits>().unwrap();
        assert_eq!(limits.max_age, 60);
        assert_eq!(limits.min_age, 18);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let doc = Document::new(Limits::default()).unwrap();
        assert!(doc.decode(r#"{"max_age": "sixty"}"#).is_err());
        assert!(doc.decode("not json").is_err());
    }

    #[test]
    fn test_downcast_wrong_type() {
        let doc = Document::new(Limits::default()).unwrap();
        assert!(doc.downcast::<String>().is_none());
    }

    #[test]
    fn test_untyped_json_document() {
        let doc = Document::new(serde_json::json!({})).unwrap();
        let fresh = doc.decode(r#"{"a": [1, 2]}"#).unwrap();
        assert_eq!(fresh.json()["a"][1], 2);
    }
}
