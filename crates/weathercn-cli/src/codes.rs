//! Provider code tables: weather-condition codes, wind-power levels and
//! AQI categories. The upstream encodes conditions as zero-padded
//! two-digit strings with a pair of coarse three-digit fallbacks.

/// Condition label for a weather code. Unknown codes map to `未知`
/// rather than echoing the raw code (wind-power lookups behave
/// differently, see [`wind_power_label`]).
pub fn weather_label(code: &str) -> &'static str {
    match code {
        "00" => "晴",
        "01" => "多云",
        "02" => "阴",
        "03" => "小雨",
        "04" => "中雨",
        "05" => "大雨",
        "06" => "暴雨",
        "07" => "雷阵雨",
        "08" => "阵雨",
        "09" => "小雪",
        "10" => "中雪",
        "11" => "大雪",
        "12" => "暴雪",
        "13" => "雾",
        "14" => "霾",
        "15" => "沙尘",
        "16" => "扬沙",
        "17" => "浮尘",
        "18" => "强沙尘暴",
        "19" => "雷阵雨伴有冰雹",
        "20" => "小雨-中雨",
        "21" => "中雨-大雨",
        "22" => "大雨-暴雨",
        "23" => "暴雨-大暴雨",
        "24" => "大暴雨-特大暴雨",
        "25" => "小雪-中雪",
        "26" => "中雪-大雪",
        "27" => "大雪-暴雪",
        "301" => "多云",
        "302" => "阴",
        _ => "未知",
    }
}

/// Wind-power label for a level code. Single-digit codes and their
/// zero-padded twins map to the same label. Unknown codes come back
/// unchanged: the upstream sometimes inlines a ready-made label (for
/// example `3级`) in the same field.
pub fn wind_power_label(code: &str) -> &str {
    match code {
        "0" | "00" => "微风",
        "1" | "01" => "1级",
        "2" | "02" => "2级",
        "3" | "03" => "3级",
        "4" | "04" => "4级",
        "5" | "05" => "5级",
        "6" | "06" => "6级",
        "7" | "07" => "7级",
        "8" | "08" => "8级",
        "9" | "09" => "9级",
        "10" => "10级",
        "11" => "11级",
        "12" => "12级及以上",
        other => other,
    }
}

/// AQI category with `<=` boundary semantics; 0 means the upstream did
/// not report a reading.
pub fn aqi_category(aqi: i64) -> &'static str {
    if aqi == 0 {
        return "未知";
    }
    if aqi <= 50 {
        "优"
    } else if aqi <= 100 {
        "良"
    } else if aqi <= 150 {
        "轻度污染"
    } else if aqi <= 200 {
        "中度污染"
    } else if aqi <= 300 {
        "重度污染"
    } else {
        "严重污染"
    }
}
