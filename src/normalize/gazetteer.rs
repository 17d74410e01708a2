//! # Gazetteer
//! Fixed lookup tables of Chinese manufacturing cities and provinces, plus
//! pure helpers to find them in free text.
//!
//! - Matching is case-insensitive and word-bounded.
//! - Direct-administered municipalities (Shanghai, Beijing, ...) are their own
//!   province.
//! - City aliases cover common romanizations ("Canton", "Amoy").

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug)]
pub struct City {
    pub name: &'static str,
    pub province: &'static str,
    /// Lower-case spellings that refer to this city, canonical first.
    pub aliases: &'static [&'static str],
}

#[derive(Debug)]
pub struct Province {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

macro_rules! city {
    ($name:literal, $prov:literal, [$($alias:literal),+]) => {
        City { name: $name, province: $prov, aliases: &[$($alias),+] }
    };
}

pub static CITIES: &[City] = &[
    // Guangdong
    city!("Guangzhou", "Guangdong", ["guangzhou", "canton"]),
    city!("Shenzhen", "Guangdong", ["shenzhen"]),
    city!("Dongguan", "Guangdong", ["dongguan"]),
    city!("Foshan", "Guangdong", ["foshan"]),
    city!("Zhongshan", "Guangdong", ["zhongshan"]),
    city!("Zhuhai", "Guangdong", ["zhuhai"]),
    city!("Shantou", "Guangdong", ["shantou", "swatow"]),
    city!("Huizhou", "Guangdong", ["huizhou"]),
    city!("Jiangmen", "Guangdong", ["jiangmen"]),
    city!("Zhaoqing", "Guangdong", ["zhaoqing"]),
    city!("Chaozhou", "Guangdong", ["chaozhou"]),
    city!("Jieyang", "Guangdong", ["jieyang"]),
    // Zhejiang
    city!("Hangzhou", "Zhejiang", ["hangzhou"]),
    city!("Ningbo", "Zhejiang", ["ningbo", "ningpo"]),
    city!("Wenzhou", "Zhejiang", ["wenzhou"]),
    city!("Yiwu", "Zhejiang", ["yiwu"]),
    city!("Jinhua", "Zhejiang", ["jinhua"]),
    city!("Taizhou", "Zhejiang", ["taizhou"]),
    city!("Shaoxing", "Zhejiang", ["shaoxing"]),
    city!("Jiaxing", "Zhejiang", ["jiaxing"]),
    city!("Huzhou", "Zhejiang", ["huzhou"]),
    city!("Lishui", "Zhejiang", ["lishui"]),
    city!("Cixi", "Zhejiang", ["cixi"]),
    city!("Yuyao", "Zhejiang", ["yuyao"]),
    city!("Yongkang", "Zhejiang", ["yongkang"]),
    // Jiangsu
    city!("Suzhou", "Jiangsu", ["suzhou"]),
    city!("Nanjing", "Jiangsu", ["nanjing", "nanking"]),
    city!("Wuxi", "Jiangsu", ["wuxi"]),
    city!("Changzhou", "Jiangsu", ["changzhou"]),
    city!("Nantong", "Jiangsu", ["nantong"]),
    city!("Yangzhou", "Jiangsu", ["yangzhou"]),
    city!("Kunshan", "Jiangsu", ["kunshan"]),
    city!("Xuzhou", "Jiangsu", ["xuzhou"]),
    city!("Zhenjiang", "Jiangsu", ["zhenjiang"]),
    // Fujian
    city!("Xiamen", "Fujian", ["xiamen", "amoy"]),
    city!("Fuzhou", "Fujian", ["fuzhou"]),
    city!("Quanzhou", "Fujian", ["quanzhou"]),
    city!("Jinjiang", "Fujian", ["jinjiang"]),
    city!("Putian", "Fujian", ["putian"]),
    city!("Zhangzhou", "Fujian", ["zhangzhou"]),
    // Shandong
    city!("Qingdao", "Shandong", ["qingdao", "tsingtao"]),
    city!("Jinan", "Shandong", ["jinan"]),
    city!("Yantai", "Shandong", ["yantai"]),
    city!("Weifang", "Shandong", ["weifang"]),
    city!("Linyi", "Shandong", ["linyi"]),
    city!("Zibo", "Shandong", ["zibo"]),
    city!("Weihai", "Shandong", ["weihai"]),
    // Hebei
    city!("Shijiazhuang", "Hebei", ["shijiazhuang"]),
    city!("Baoding", "Hebei", ["baoding"]),
    city!("Tangshan", "Hebei", ["tangshan"]),
    city!("Cangzhou", "Hebei", ["cangzhou"]),
    city!("Hengshui", "Hebei", ["hengshui"]),
    // Central / west / north-east
    city!("Zhengzhou", "Henan", ["zhengzhou"]),
    city!("Luoyang", "Henan", ["luoyang"]),
    city!("Wuhan", "Hubei", ["wuhan"]),
    city!("Changsha", "Hunan", ["changsha"]),
    city!("Chengdu", "Sichuan", ["chengdu"]),
    city!("Hefei", "Anhui", ["hefei"]),
    city!("Wuhu", "Anhui", ["wuhu"]),
    city!("Dalian", "Liaoning", ["dalian"]),
    city!("Shenyang", "Liaoning", ["shenyang"]),
    // Municipalities
    city!("Shanghai", "Shanghai", ["shanghai"]),
    city!("Beijing", "Beijing", ["beijing", "peking"]),
    city!("Tianjin", "Tianjin", ["tianjin"]),
    city!("Chongqing", "Chongqing", ["chongqing"]),
];

pub static PROVINCES: &[Province] = &[
    Province { name: "Guangdong", aliases: &["guangdong", "kwangtung"] },
    Province { name: "Zhejiang", aliases: &["zhejiang", "chekiang"] },
    Province { name: "Jiangsu", aliases: &["jiangsu"] },
    Province { name: "Fujian", aliases: &["fujian", "fukien"] },
    Province { name: "Shandong", aliases: &["shandong"] },
    Province { name: "Hebei", aliases: &["hebei"] },
    Province { name: "Henan", aliases: &["henan"] },
    Province { name: "Hubei", aliases: &["hubei"] },
    Province { name: "Hunan", aliases: &["hunan"] },
    Province { name: "Sichuan", aliases: &["sichuan"] },
    Province { name: "Anhui", aliases: &["anhui"] },
    Province { name: "Liaoning", aliases: &["liaoning"] },
    Province { name: "Shanghai", aliases: &["shanghai"] },
    Province { name: "Beijing", aliases: &["beijing"] },
    Province { name: "Tianjin", aliases: &["tianjin"] },
    Province { name: "Chongqing", aliases: &["chongqing"] },
];

fn alias_regex(aliases: &[&str]) -> Regex {
    let alt = aliases
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    // Aliases are plain ASCII words; the pattern cannot fail to compile.
    Regex::new(&format!(r"(?i)\b(?:{alt})\b")).expect("gazetteer alias regex")
}

static CITY_RES: Lazy<Vec<(Regex, &'static City)>> =
    Lazy::new(|| CITIES.iter().map(|c| (alias_regex(c.aliases), c)).collect());

static PROVINCE_RES: Lazy<Vec<(Regex, &'static Province)>> =
    Lazy::new(|| PROVINCES.iter().map(|p| (alias_regex(p.aliases), p)).collect());

/// Look up a city by canonical name or alias.
pub fn city(name: &str) -> Option<&'static City> {
    let n = name.trim().to_ascii_lowercase();
    let n = n.strip_suffix(" city").unwrap_or(&n).trim();
    CITIES.iter().find(|c| c.aliases.contains(&n))
}

/// Look up a province by canonical name or alias.
pub fn province(name: &str) -> Option<&'static Province> {
    let n = name.trim().to_ascii_lowercase();
    let n = n.strip_suffix(" province").unwrap_or(&n).trim();
    PROVINCES.iter().find(|p| p.aliases.contains(&n))
}

/// Cities known to belong to a province.
pub fn cities_in(province_name: &str) -> impl Iterator<Item = &'static City> + '_ {
    CITIES
        .iter()
        .filter(move |c| c.province.eq_ignore_ascii_case(province_name))
}

/// Province of a known city.
pub fn province_of(city_name: &str) -> Option<&'static str> {
    city(city_name).map(|c| c.province)
}

/// Leftmost known city mentioned in `text`.
pub fn find_city(text: &str) -> Option<&'static City> {
    CITY_RES
        .iter()
        .filter_map(|(re, c)| re.find(text).map(|m| (m.start(), *c)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, c)| c)
}

/// City named by an address. Comma-separated tokens are checked right to
/// left first, so "Ningbo Road, Shanghai" resolves to Shanghai; free text
/// without a standalone city token falls back to `find_city`.
pub fn city_in_address(address: &str) -> Option<&'static City> {
    address
        .split(',')
        .rev()
        .find_map(city)
        .or_else(|| find_city(address))
}

/// Leftmost known province mentioned in `text`.
pub fn find_province(text: &str) -> Option<&'static Province> {
    PROVINCE_RES
        .iter()
        .filter_map(|(re, p)| re.find(text).map(|m| (m.start(), *p)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, p)| p)
}
