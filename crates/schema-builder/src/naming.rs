// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use heck::{ToLowerCamelCase, ToUpperCamelCase};

/// A type with both singular and plural versions of itself.
pub trait ToPlural {
    fn to_plural(&self) -> String;
}

impl ToPlural for str {
    fn to_plural(&self) -> String {
        let plural_name = pluralizer::pluralize(self, 2, false);
        if plural_name == self {
            // Force pluralization if the pluralizer returns the same string
            format!("{self}s")
        } else {
            plural_name
        }
    }
}

/// Short name of a class identity: the last segment of a namespaced
/// `App\Page` / `app::Page` / `app/Page` string.
pub fn short_class_name(class: &str) -> String {
    class
        .rsplit(['\\', '/', ':'])
        .next()
        .unwrap_or(class)
        .to_string()
}

pub fn read_query_name(type_name: &str) -> String {
    format!("read{}", type_name.to_plural())
}

pub fn read_one_query_name(type_name: &str) -> String {
    format!("readOne{type_name}")
}

pub fn mutation_name(operation: &str, type_name: &str) -> String {
    format!("{}{type_name}", operation.to_lower_camel_case())
}

pub fn interface_name(type_name: &str) -> String {
    format!("{type_name}Interface")
}

pub fn base_interface_name(schema_name: &str) -> String {
    format!("{}BaseInterface", schema_name.to_upper_camel_case())
}

pub fn inheritance_union_name(type_name: &str) -> String {
    format!("{type_name}InheritanceUnion")
}

pub fn filter_fields_name(type_name: &str) -> String {
    format!("{type_name}FilterFields")
}

pub fn sort_fields_name(type_name: &str) -> String {
    format!("{type_name}SortFields")
}

pub fn comparator_name(scalar_name: &str) -> String {
    format!("QueryFilter{scalar_name}Comparator")
}

pub fn connection_name(type_name: &str) -> String {
    format!("{type_name}Connection")
}

pub fn edge_name(type_name: &str) -> String {
    format!("{type_name}Edge")
}

pub fn create_input_name(type_name: &str) -> String {
    format!("{type_name}CreateInput")
}

pub fn update_input_name(type_name: &str) -> String {
    format!("{type_name}UpdateInput")
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplatform_test::multiplatform_test;

    #[multiplatform_test]
    fn query_names() {
        assert_eq!(read_query_name("Page"), "readPages");
        assert_eq!(read_one_query_name("Page"), "readOnePage");
        assert_eq!(mutation_name("create", "Page"), "createPage");
    }

    #[multiplatform_test]
    fn class_short_names() {
        assert_eq!(short_class_name("App\\Model\\Page"), "Page");
        assert_eq!(short_class_name("app::model::Page"), "Page");
        assert_eq!(short_class_name("Page"), "Page");
    }

    #[multiplatform_test]
    fn formatter_names() {
        assert_eq!(interface_name("Page"), "PageInterface");
        assert_eq!(inheritance_union_name("Page"), "PageInheritanceUnion");
        assert_eq!(filter_fields_name("Page"), "PageFilterFields");
        assert_eq!(sort_fields_name("Page"), "PageSortFields");
        assert_eq!(comparator_name("String"), "QueryFilterStringComparator");
        assert_eq!(connection_name("Page"), "PageConnection");
    }
}
