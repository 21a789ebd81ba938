//! 분류 키워드 테이블
//!
//! 모든 키워드는 소문자이며, 소문자로 변환한 메시지에 대해 부분 문자열로 매칭합니다.
//! 한자 키워드는 대소문자 변환의 영향을 받지 않습니다.

/// ERROR 레벨 키워드
pub const ERROR: &[&str] = &["error", "exception", "fail", "错误", "异常", "失败"];

/// WARN 레벨 키워드
pub const WARN: &[&str] = &["warn", "warning", "警告"];

/// DEBUG 레벨 키워드
pub const DEBUG: &[&str] = &["debug", "调试"];

/// 위챗 서명 키워드
pub const WECHAT: &[&str] = &["wx", "wechat", "微信", "mm"];

/// 민감 데이터 키워드
pub const SENSITIVE: &[&str] = &[
    "phone", "mobile", "手机", "电话", "token", "auth", "认证", "令牌", "openid", "userid", "用户",
    "password", "密码", "pwd",
];

/// 훅 활동 키워드
pub const HOOK: &[&str] = &["hook", "frida", "xposed", "intercept", "inject", "拦截", "注入"];

/// 중국 본토 휴대전화 번호 패턴
pub const PHONE_PATTERN: &str = r"1[3-9]\d{9}";

/// 위챗 패키지명
pub const WECHAT_PACKAGE: &str = "com.tencent.mm";

/// 소문자 메시지에 키워드 중 하나라도 포함되는지 확인합니다.
pub fn contains_any(lowered: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lowered.contains(k))
}
